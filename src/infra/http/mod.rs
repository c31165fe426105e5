mod auth;
mod follows;
mod middleware;
mod posts;
mod public;
mod session;

pub use public::{HttpState, build_router};
pub use session::{AuthUser, MaybeUser, SESSION_COOKIE, login_redirect_target};

/// Accept a caller-supplied redirect target only when it is a same-origin
/// path; anything else (absolute URLs, schemes, protocol-relative `//`)
/// falls back to the given default.
pub fn safe_redirect_target<'a>(candidate: Option<&'a str>, fallback: &'a str) -> &'a str {
    match candidate {
        Some(target)
            if target.starts_with('/')
                && !target.starts_with("//")
                && !target.starts_with("/\\") =>
        {
            target
        }
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_origin_paths_pass() {
        assert_eq!(safe_redirect_target(Some("/leo/42/"), "/"), "/leo/42/");
        assert_eq!(safe_redirect_target(Some("/?page=2"), "/"), "/?page=2");
    }

    #[test]
    fn external_targets_fall_back() {
        assert_eq!(safe_redirect_target(None, "/"), "/");
        assert_eq!(safe_redirect_target(Some(""), "/"), "/");
        assert_eq!(safe_redirect_target(Some("https://evil.test/"), "/"), "/");
        assert_eq!(safe_redirect_target(Some("//evil.test/"), "/"), "/");
        assert_eq!(safe_redirect_target(Some("/\\evil.test"), "/"), "/");
        assert_eq!(safe_redirect_target(Some("javascript:alert(1)"), "/"), "/");
    }
}
