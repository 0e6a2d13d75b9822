pub(crate) mod autorenew_handler;
pub(crate) mod types;

pub use autorenew_handler::{
    configure_routes, AutorenewApiDoc, ACME_AUTORENEW_PATH, DEPRECATED_AUTORENEW_PATH,
};
pub use types::{create_autorenew_app_state, Alert, AlertsResponse, AutorenewAppState, CurrentUser};
