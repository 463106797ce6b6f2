use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the CS2 relay backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::events::event_stream,
        crate::routes::api::global_document,
        crate::routes::api::submit_command,
        crate::routes::api::local_buttons,
        crate::routes::api::replace_local_buttons,
        crate::routes::buttons::list_buttons,
        crate::routes::buttons::add_button,
        crate::routes::buttons::delete_button,
        crate::routes::buttons::activate_button,
        crate::routes::buttons::export_config,
        crate::routes::buttons::import_config,
        crate::routes::buttons::reset_config,
        crate::routes::buttons::event_log,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::snapshot::Snapshot,
            crate::dto::snapshot::ButtonEntry,
            crate::dto::command::Command,
            crate::dto::command::CommandSubmission,
            crate::dto::command::CommandAck,
            crate::dto::buttons::AddButtonRequest,
            crate::dto::buttons::ButtonView,
            crate::dto::buttons::ButtonsResponse,
            crate::dto::buttons::ActionResponse,
            crate::dao::models::GlobalDocument,
            crate::state::event_log::LogEntry,
            crate::state::event_log::Severity,
            crate::state::store::PulseState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "poller", description = "Endpoints consumed by the GSI companion"),
        (name = "buttons", description = "Operator button management"),
        (name = "events", description = "Server-sent events stream"),
    )
)]
pub struct ApiDoc;
