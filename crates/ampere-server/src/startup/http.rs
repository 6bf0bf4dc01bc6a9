use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::api::{self, AppState};

/// Bind the internal HTTP surface.
///
/// Signal handling is left to [`super::wait_for_shutdown_signal`]; the caller
/// stops the server through its handle.
pub fn http_server(
    app_state: Arc<AppState>,
    address: String,
    port: u16,
) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .configure(api::routes)
    })
    .disable_signals()
    .bind((address, port))?
    .run())
}
