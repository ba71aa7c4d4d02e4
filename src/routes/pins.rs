//! Pin export routes.
//!
//! DESIGN
//! ======
//! Both routes are stateless: each request builds a fresh engine from the
//! posted design, loads the rasters it references through the shared fetcher,
//! and discards everything once the response is written.
//!
//! Rasterizing and PNG encoding run on the blocking pool. A bulk batch runs
//! there as a whole and drives its asset fetches through the runtime handle,
//! so async workers never sit inside tiny-skia or the PNG encoder.
//!
//! ERROR HANDLING
//! ==============
//! Client mistakes (bad CSV, oversized batches) are 4xx with the error text
//! as the body. A bulk run that outlives `BULK_TIMEOUT_SECS` is cancelled
//! between rows and reported as 504; no partial archive is returned.

#[cfg(test)]
#[path = "pins_test.rs"]
mod pins_test;

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use canvas::bulk::{self, BulkMapping};
use canvas::engine::EngineCore;
use canvas::{CanvasError, SceneRecord};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::services::archive::{self, ArchiveError};
use crate::services::tabular::{self, TabularError};
use crate::state::AppState;

type ApiError = (StatusCode, String);

/// Failure of the blocking half of a bulk request.
#[derive(Debug, thiserror::Error)]
enum BatchError {
    #[error(transparent)]
    Canvas(#[from] CanvasError),
    #[error(transparent)]
    Archive(ArchiveError),
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub design: SceneRecord,
    pub csv: String,
    #[serde(default)]
    pub mapping: BulkMapping,
}

/// `POST /api/pins/render`: the posted design as a PNG.
pub async fn render(State(state): State<AppState>, Json(design): Json<SceneRecord>) -> Result<impl IntoResponse, ApiError> {
    let mut core = EngineCore::from_record(&design, state.fonts.clone()).map_err(canvas_error)?;
    core.load_images(state.fetcher.as_ref()).await;

    let size = core.scene.canvas_size();
    let elements = core.scene.len();
    let png = tokio::task::spawn_blocking(move || core.export_png())
        .await
        .map_err(join_error)?
        .map_err(canvas_error)?;

    info!(%size, elements, bytes = png.len(), "pin rendered");
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// `POST /api/pins/bulk`: one PNG per CSV row, packaged as a zip.
pub async fn bulk(State(state): State<AppState>, Json(req): Json<BulkRequest>) -> Result<impl IntoResponse, ApiError> {
    let source = tabular::parse_csv(&req.csv, state.config.max_bulk_rows).map_err(tabular_error)?;
    let EngineCore { scene, mut rasters, .. } =
        EngineCore::from_record(&req.design, state.fonts.clone()).map_err(canvas_error)?;

    let cancel = CancellationToken::new();
    let timer = {
        let cancel = cancel.clone();
        let timeout = state.config.bulk_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel.cancel();
        })
    };
    let handle = tokio::runtime::Handle::current();
    let fetcher = Arc::clone(&state.fetcher);
    let batch = tokio::task::spawn_blocking(move || {
        let outputs = handle.block_on(bulk::generate(&scene, &source, &req.mapping, &mut rasters, fetcher.as_ref(), &cancel))?;
        archive::write_zip(&outputs).map(|zip| (outputs.len(), zip)).map_err(BatchError::Archive)
    })
    .await;
    timer.abort();

    let (rows, zip) = batch.map_err(join_error)?.map_err(|e| match e {
        BatchError::Canvas(e) => canvas_error(e),
        BatchError::Archive(e) => archive_error(e),
    })?;
    info!(rows, bytes = zip.len(), "bulk archive written");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"pins.zip\""),
        ],
        zip,
    ))
}

pub(crate) fn canvas_error_to_status(err: &CanvasError) -> StatusCode {
    match err {
        CanvasError::UnknownKind(_)
        | CanvasError::MalformedElement(_)
        | CanvasError::InvalidAttribute { .. }
        | CanvasError::UnknownCanvasSize(_)
        | CanvasError::IdOutOfRange(_)
        | CanvasError::NoRows => StatusCode::BAD_REQUEST,
        CanvasError::ElementNotFound(_) => StatusCode::NOT_FOUND,
        CanvasError::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
        CanvasError::SurfaceAllocation { .. } | CanvasError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn tabular_error_to_status(err: &TabularError) -> StatusCode {
    match err {
        TabularError::TooManyRows { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        TabularError::MissingHeader | TabularError::EmptyColumn(_) | TabularError::Malformed(_) => StatusCode::BAD_REQUEST,
    }
}

fn canvas_error(err: CanvasError) -> ApiError {
    let status = canvas_error_to_status(&err);
    if status.is_server_error() {
        warn!(error = %err, "pin generation failed");
    }
    (status, err.to_string())
}

fn tabular_error(err: TabularError) -> ApiError {
    (tabular_error_to_status(&err), err.to_string())
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    warn!(error = %err, "render task failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "render task failed".to_owned())
}

fn archive_error(err: ArchiveError) -> ApiError {
    warn!(error = %err, "zip packaging failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
