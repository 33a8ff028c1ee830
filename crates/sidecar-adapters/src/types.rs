/// The pair recovered from a successful upload: the hosted image URL and,
/// when the host provides one, a separate thumbnail URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPair {
    pub image_url: String,
    pub thumb_url: Option<String>,
}

/// One entry on a service's "my galleries" page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryDescriptor {
    pub id: String,
    pub name: Option<String>,
    pub url: Option<String>,
}

/// How a login response is checked for success, in the generic state
/// machine described by §4.8: a redirect to a path, a marker string in the
/// body, or a token at a JSON path.
#[derive(Debug, Clone)]
pub enum SuccessMarker {
    RedirectContains(&'static str),
    BodyContains(&'static str),
    JsonTokenPath(&'static str),
}

/// Hand-written per-host configuration. Each host's adapter is a thin
/// wrapper around the shared generic login/upload/gallery algorithms,
/// parameterized by one of these — the per-host knowledge is in the
/// recipe, not in a separate code path.
#[derive(Debug, Clone)]
pub struct HostRecipe {
    pub service: &'static str,
    pub login_url: &'static str,
    pub username_field: &'static str,
    pub password_field: &'static str,
    pub login_success: SuccessMarker,
    pub upload_url: &'static str,
    pub file_field: &'static str,
    pub image_url_path: &'static str,
    pub thumb_url_path: Option<&'static str>,
    pub galleries_url: Option<&'static str>,
    pub create_gallery_url: Option<&'static str>,
    pub requires_finalize: bool,
    /// Whether this host needs an authenticated session before it will
    /// accept an upload. False for hosts that accept anonymous uploads
    /// (§4.8: "if the service requires login, otherwise proceed
    /// anonymously").
    pub requires_login: bool,
}
