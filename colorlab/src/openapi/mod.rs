//! OpenAPI documentation for the `/api/*` surface, served at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{self, models};

/// Bearer access tokens issued by `/api/auth/login` and `/api/auth/refresh`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token from login or refresh. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer ACCESS_TOKEN\n```\n\n\
                            Refresh tokens are not accepted here.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Colorlab API",
        description = "Clientes, coloraciones, reportes de servicio y generación de documentos. \
            Every JSON response is wrapped in `{ code, error, message, technicalMessage?, data? }`; \
            the schemas below describe `data`."
    ),
    servers((url = "/api", description = "Colorlab API")),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::refresh,
        api::handlers::auth::logout,
        api::handlers::auth::logout_all,
        api::handlers::users::get_user_by_id,
        api::handlers::users::get_user_by_email,
        api::handlers::users::update_user,
        api::handlers::users::create_user,
        api::handlers::users::search_users,
        api::handlers::clientes::list_clientes,
        api::handlers::clientes::search_clientes,
        api::handlers::clientes::paginate_clientes,
        api::handlers::clientes::get_cliente,
        api::handlers::clientes::create_cliente,
        api::handlers::clientes::update_cliente,
        api::handlers::clientes::delete_cliente,
        api::handlers::coloraciones::list_coloraciones,
        api::handlers::coloraciones::search_coloraciones,
        api::handlers::coloraciones::get_coloracion,
        api::handlers::coloraciones::create_coloracion,
        api::handlers::coloraciones::update_coloracion,
        api::handlers::coloraciones::delete_coloracion,
        api::handlers::reportes::list_reportes,
        api::handlers::reportes::get_reportes_by_date_range,
        api::handlers::reportes::get_reportes_by_cliente,
        api::handlers::reportes::get_reporte,
        api::handlers::reportes::create_reporte,
        api::handlers::reportes::update_reporte,
        api::handlers::reportes::delete_reporte,
        api::handlers::reportes::generar_documento,
        api::handlers::fotos_reportes::list_fotos,
        api::handlers::fotos_reportes::get_fotos_by_reporte,
        api::handlers::fotos_reportes::get_foto,
        api::handlers::fotos_reportes::create_foto,
        api::handlers::fotos_reportes::update_foto,
        api::handlers::fotos_reportes::delete_foto,
        api::handlers::fotos_reportes::delete_fotos_by_reporte,
    ),
    components(
        schemas(
            models::auth::RegisterRequest,
            models::auth::LoginRequest,
            models::auth::RefreshRequest,
            models::auth::LogoutAllRequest,
            models::auth::TokenPairResponse,
            models::auth::LoginResponse,
            models::auth::LogoutAllResponse,
            models::users::UserResponse,
            models::users::UserCreate,
            models::users::UserUpdate,
            models::clientes::ClienteCreate,
            models::clientes::ClienteResponse,
            models::coloraciones::ColoracionCreate,
            models::coloraciones::ColoracionResponse,
            models::reportes::ReporteCreate,
            models::reportes::ReporteResponse,
            models::fotos_reportes::FotoReporteCreate,
            models::fotos_reportes::FotoReporteResponse,
            models::fotos_reportes::FotosDeletedResponse,
            models::documents::GenerarDocumentoRequest,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and session tokens"),
        (name = "users", description = "User lookup and administration"),
        (name = "clientes", description = "Customers"),
        (name = "coloraciones", description = "Coloring formulas"),
        (name = "reportes", description = "Service reports and document generation"),
        (name = "fotos-reportes", description = "Photos attached to reports"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_declares_bearer_auth_and_paths() {
        let doc = ApiDoc::openapi();

        let components = doc.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("BearerAuth"));
        assert!(components.schemas.contains_key("ReporteResponse"));

        for path in ["/auth/login", "/clientes/{id}", "/reportes/generar-documento", "/fotos-reportes/reporte/{reporte_id}"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
