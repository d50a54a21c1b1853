use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{error, info};

use crate::manager::TagCommander;
use crate::objects::tag::{Tag, TagRecord};
use crate::objects::tag_file;

#[derive(Clone)]
struct ApiState {
    commander: TagCommander,
    file: String,
}

/// Serves the admin surface on its own thread. The rest of the program is
/// plain threads, so the axum stack gets a private current-thread runtime.
/// This is also where SIGINT/SIGTERM are caught: on shutdown the current
/// population is written back to the tag file and the process exits 0.
pub fn serve(port: u16, commander: TagCommander, file: String) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("unable to build the admin runtime: {e}");
            std::process::exit(1);
        }
    };
    runtime.block_on(async move {
        let state = ApiState { commander, file };
        let app = Router::new()
            .route("/api/v1/tags", post(add_tags).delete(delete_tags))
            .with_state(state.clone());
        let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("error binding the admin API on port {port}: {e}");
                std::process::exit(1);
            }
        };
        info!("admin API listening on port {port}");
        tokio::spawn(save_on_shutdown(state));
        if let Err(e) = axum::serve(listener, app).await {
            error!("admin API failed: {e}");
            std::process::exit(1);
        }
    });
}

async fn save_on_shutdown(state: ApiState) {
    shutdown_signal().await;
    info!("shutting down");
    match state.commander.retrieve() {
        Ok(tags) => match tag_file::save(Path::new(&state.file), &tags) {
            Ok(_) => info!("{} tags saved to {}", tags.len(), state.file),
            Err(e) => error!("error saving tags to {}: {e}", state.file),
        },
        Err(e) => error!("unable to retrieve tags for saving: {e}"),
    }
    std::process::exit(0);
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => (),
                _ = term.recv() => (),
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn to_tags(records: &[TagRecord]) -> Result<Vec<Tag>, Response> {
    let mut tags = Vec::with_capacity(records.len());
    for record in records {
        match Tag::from_record(record) {
            Ok(tag) => tags.push(tag),
            Err(e) => return Err((StatusCode::BAD_REQUEST, format!("{e}\n")).into_response()),
        }
    }
    Ok(tags)
}

async fn add_tags(State(state): State<ApiState>, Json(records): Json<Vec<TagRecord>>) -> Response {
    let tags = match to_tags(&records) {
        Ok(tags) => tags,
        Err(response) => return response,
    };
    match state.commander.add(tags) {
        Ok(inserted) if inserted.is_empty() => {
            (StatusCode::ALREADY_REPORTED, "The tag already exists!\n").into_response()
        }
        Ok(inserted) => {
            info!("add {} tag(s)", inserted.len());
            (StatusCode::ACCEPTED, "Post requested!\n").into_response()
        }
        Err(e) => {
            error!("error adding tags: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "The tag manager is unavailable.\n").into_response()
        }
    }
}

async fn delete_tags(State(state): State<ApiState>, Json(records): Json<Vec<TagRecord>>) -> Response {
    let tags = match to_tags(&records) {
        Ok(tags) => tags,
        Err(response) => return response,
    };
    match state.commander.delete(tags) {
        Ok(removed) if removed.is_empty() => {
            (StatusCode::NO_CONTENT, "The tag doesn't exist!\n").into_response()
        }
        Ok(removed) => {
            info!("delete {} tag(s)", removed.len());
            (StatusCode::ACCEPTED, "Delete requested!\n").into_response()
        }
        Err(e) => {
            error!("error deleting tags: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "The tag manager is unavailable.\n").into_response()
        }
    }
}
