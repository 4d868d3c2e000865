//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the dashboard and the API
//! server for live project and credit updates.

use crate::web::rest::{ProfileResponse, ProjectResponse};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Asks for a fresh snapshot of projects and profile.
    Refresh,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the change subscription is live.
    Subscribed,

    /// The full, newest-first project list after any project change.
    ProjectsChanged { projects: Vec<ProjectResponse> },

    /// The profile after a credit or plan change.
    ProfileChanged { profile: ProfileResponse },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}
