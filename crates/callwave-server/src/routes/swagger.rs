//! OpenAPI Documentation
//!
//! Centralized API documentation using utoipa.

use utoipa::OpenApi;

use crate::application::{StopSummary, SweepReport};
use crate::models::{
    // Batch models
    BatchDetailResponse,
    BatchResponse,
    // Call models
    CallEntryRequest,
    CallResponse,
    ChangeResponse,
    CreateBatchRequest,
    DispatchAccepted,
    TranscriptResponse,
    // Webhook models
    WebhookAck,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Batch endpoints
        super::batch::create_batch,
        super::batch::list_batches,
        super::batch::get_batch,
        super::batch::dispatch_batch,
        super::batch::stop_batch,
        super::batch::batch_changes,
        // Call endpoints
        super::call::get_call,
        super::call::fetch_transcript,
        // Watchdog endpoints
        super::watchdog::sweep,
        // Webhook endpoints
        super::webhook::provider_webhook,
    ),
    info(
        title = "Callwave API",
        version = "0.1.0",
        description = "Outbound call batch orchestration\n\nDispatches batches of phone calls through a voice provider and tracks every call to a terminal status.",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Batch", description = "Batch - Creation, dispatch, stop and change long-poll"),
        (name = "Call", description = "Call - Call records and transcripts"),
        (name = "Watchdog", description = "Watchdog - Stuck-call sweeps"),
        (name = "Webhook", description = "Webhook - Provider lifecycle notifications"),
    ),
    components(
        schemas(
            // Batch
            CreateBatchRequest,
            CallEntryRequest,
            BatchResponse,
            BatchDetailResponse,
            DispatchAccepted,
            StopSummary,
            ChangeResponse,
            // Call
            CallResponse,
            TranscriptResponse,
            // Watchdog
            SweepReport,
            // Webhook
            WebhookAck,
        )
    ),
)]
pub struct ApiDoc;
