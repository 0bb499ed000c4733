use super::handlers::{auth, health};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both
/// served and documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the
    // route to OpenAPI.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::capability::capability))
        .routes(routes!(auth::tokens::refresh))
        .routes(routes!(auth::tokens::logout))
        .routes(routes!(auth::tokens::revoke_all))
        .routes(routes!(auth::totp::totp_setup))
        .routes(routes!(auth::totp::totp_complete))
        .routes(routes!(auth::totp::totp_validate))
        .routes(routes!(auth::totp::totp_disable));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("OPAQUE registration, login, and token lifecycle".to_string());

    let mut totp_tag = Tag::new("totp");
    totp_tag.description = Some("Second-factor enrollment and validation".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service health".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, totp_tag, health_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    OpenApiBuilder::new().info(info).build()
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn every_core_route_is_documented() {
        let spec = openapi();
        let paths = &spec.paths.paths;
        for path in [
            "/api/opaque/health",
            "/api/opaque/register",
            "/api/opaque/login",
            "/api/opaque/capability",
            "/api/refresh",
            "/api/logout",
            "/api/revoke-all",
            "/api/totp/setup",
            "/api/totp/complete",
            "/api/totp/validate",
            "/api/totp/disable",
        ] {
            assert!(paths.contains_key(path), "missing route: {path}");
        }
    }
}
