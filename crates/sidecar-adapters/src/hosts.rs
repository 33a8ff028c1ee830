use std::sync::Arc;

use crate::adapter::Adapter;
use crate::image_host::ImageHostAdapter;
use crate::types::{HostRecipe, SuccessMarker};

const PIXHOST: HostRecipe = HostRecipe {
    service: "pixhost.to",
    login_url: "https://pixhost.to/login",
    username_field: "email",
    password_field: "password",
    login_success: SuccessMarker::RedirectContains("/dashboard"),
    upload_url: "https://api.pixhost.to/images",
    file_field: "img",
    image_url_path: "show_url",
    thumb_url_path: Some("th_url"),
    galleries_url: Some("https://pixhost.to/galleries"),
    create_gallery_url: Some("https://pixhost.to/galleries/create"),
    requires_finalize: true,
    requires_login: false,
};

const IMGBOX: HostRecipe = HostRecipe {
    service: "imgbox.com",
    login_url: "https://imgbox.com/login",
    username_field: "username",
    password_field: "password",
    login_success: SuccessMarker::BodyContains("logout"),
    upload_url: "https://imgbox.com/upload/process",
    file_field: "files[]",
    image_url_path: "data.original_url",
    thumb_url_path: Some("data.thumbnail_url"),
    galleries_url: Some("https://imgbox.com/galleries"),
    create_gallery_url: None,
    requires_finalize: false,
    requires_login: true,
};

const IMGBB: HostRecipe = HostRecipe {
    service: "imgbb.com",
    login_url: "https://imgbb.com/login",
    username_field: "login-subject",
    password_field: "password",
    login_success: SuccessMarker::JsonTokenPath("auth_token"),
    upload_url: "https://api.imgbb.com/1/upload",
    file_field: "image",
    image_url_path: "data.url",
    thumb_url_path: Some("data.thumb.url"),
    galleries_url: None,
    create_gallery_url: None,
    requires_finalize: false,
    requires_login: true,
};

const POSTIMAGES: HostRecipe = HostRecipe {
    service: "postimages.org",
    login_url: "https://postimages.org/login",
    username_field: "user",
    password_field: "pass",
    login_success: SuccessMarker::RedirectContains("/user"),
    upload_url: "https://postimages.org/json/rr",
    file_field: "upload",
    image_url_path: "data.url",
    thumb_url_path: Some("data.thumb"),
    galleries_url: Some("https://postimages.org/user/galleries"),
    create_gallery_url: Some("https://postimages.org/user/galleries/new"),
    requires_finalize: false,
    requires_login: true,
};

const IMAGEVENUE: HostRecipe = HostRecipe {
    service: "imagevenue.com",
    login_url: "https://www.imagevenue.com/login.php",
    username_field: "user",
    password_field: "pass",
    login_success: SuccessMarker::BodyContains("My Account"),
    upload_url: "https://www.imagevenue.com/upload.php",
    file_field: "upload",
    image_url_path: "data.url",
    thumb_url_path: Some("data.thumb_url"),
    galleries_url: None,
    create_gallery_url: None,
    requires_finalize: false,
    requires_login: true,
};

const RECIPES: [HostRecipe; 5] = [PIXHOST, IMGBOX, IMGBB, POSTIMAGES, IMAGEVENUE];

/// Looks up the hand-written adapter for an image-host service tag. The
/// forum (`viper`) isn't here; it has its own login/post contract and is
/// reached through [`crate::forum::ViperAdapter`] directly.
pub fn adapter_for(service: &str) -> Option<Arc<dyn Adapter>> {
    RECIPES
        .iter()
        .find(|recipe| recipe.service == service)
        .map(|recipe| Arc::new(ImageHostAdapter::new(recipe.clone())) as Arc<dyn Adapter>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_service_tags_resolve_to_an_adapter() {
        for recipe in &RECIPES {
            let adapter = adapter_for(recipe.service).expect("recipe should resolve");
            assert_eq!(adapter.service(), recipe.service);
        }
    }

    #[test]
    fn unknown_service_tag_resolves_to_none() {
        assert!(adapter_for("not-a-real-host").is_none());
    }

    #[test]
    fn exactly_one_host_requires_finalization() {
        assert_eq!(RECIPES.iter().filter(|r| r.requires_finalize).count(), 1);
    }

    #[test]
    fn pixhost_accepts_anonymous_uploads() {
        assert!(!PIXHOST.requires_login);
    }
}
