use std::fmt;

use anyhow::Error as AnyError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use crewspace_core::rbac::Permission;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tracing::error;

#[derive(Debug, Clone, Copy)]
struct ErrorDescriptor {
    status: StatusCode,
    name: &'static str,
    error_type: &'static str,
    default_message: &'static str,
}

const BAD_REQUEST_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    name: "BAD_REQUEST",
    error_type: "BAD_REQUEST",
    default_message: "Bad request.",
};

const UNAUTHORIZED_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::UNAUTHORIZED,
    name: "AUTHENTICATION_REQUIRED",
    error_type: "AUTHENTICATION_REQUIRED",
    default_message: "You must sign in first to access this resource.",
};

const CONFLICT_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::CONFLICT,
    name: "RESOURCE_ALREADY_EXISTS",
    error_type: "RESOURCE_ALREADY_EXISTS",
    default_message: "Resource already exists.",
};

const NOT_FOUND_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::NOT_FOUND,
    name: "NOT_FOUND",
    error_type: "RESOURCE_NOT_FOUND",
    default_message: "Resource not found.",
};

const FORBIDDEN_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::FORBIDDEN,
    name: "ACTION_FORBIDDEN",
    error_type: "ACTION_FORBIDDEN",
    default_message: "Action forbidden.",
};

const INTERNAL_SERVER_ERROR_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    name: "INTERNAL_SERVER_ERROR",
    error_type: "INTERNAL_SERVER_ERROR",
    default_message: "An internal error occurred.",
};

#[derive(Debug)]
pub struct AppError {
    descriptor: &'static ErrorDescriptor,
    name: String,
    error_type: String,
    message: String,
    data: Option<JsonValue>,
    source: Option<AnyError>,
}

impl AppError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::from_descriptor(&BAD_REQUEST_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_descriptor(&UNAUTHORIZED_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::from_descriptor(&FORBIDDEN_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::from_descriptor(&CONFLICT_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn internal(error: AnyError) -> Self {
        error!(?error, "internal server error");
        Self::from_descriptor(&INTERNAL_SERVER_ERROR_DESCRIPTOR, None).with_source(error)
    }

    pub(crate) fn from_anyhow(error: AnyError) -> Self {
        Self::internal(error)
    }

    pub(crate) fn workspace_not_found(workspace_id: &str) -> Self {
        let workspace_id = workspace_id.to_owned();
        let message = format!("Workspace {workspace_id} not found.");

        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message))
            .with_name("WORKSPACE_NOT_FOUND")
            .with_data(json!({ "workspaceId": workspace_id }))
    }

    pub(crate) fn project_not_found(workspace_id: &str, project_id: &str) -> Self {
        let workspace_id = workspace_id.to_owned();
        let project_id = project_id.to_owned();
        let message = format!("Project {project_id} not found in workspace {workspace_id}.");

        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message))
            .with_name("PROJECT_NOT_FOUND")
            .with_data(json!({ "workspaceId": workspace_id, "projectId": project_id }))
    }

    pub(crate) fn task_not_found(workspace_id: &str, task_id: &str) -> Self {
        let workspace_id = workspace_id.to_owned();
        let task_id = task_id.to_owned();
        let message = format!("Task {task_id} not found in workspace {workspace_id}.");

        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message))
            .with_name("TASK_NOT_FOUND")
            .with_data(json!({ "workspaceId": workspace_id, "taskId": task_id }))
    }

    pub(crate) fn workspace_access_denied(workspace_id: &str) -> Self {
        let workspace_id = workspace_id.to_owned();
        let message = format!("You do not have permission to access workspace {workspace_id}.");

        Self::from_descriptor(&FORBIDDEN_DESCRIPTOR, Some(message))
            .with_name("WORKSPACE_ACCESS_DENIED")
            .with_error_type("NO_PERMISSION")
            .with_data(json!({ "workspaceId": workspace_id }))
    }

    pub(crate) fn permission_denied(permission: Permission) -> Self {
        let token = permission.as_str();
        let message = format!("You do not have the {token} permission.");

        Self::from_descriptor(&FORBIDDEN_DESCRIPTOR, Some(message))
            .with_name("PERMISSION_DENIED")
            .with_error_type("NO_PERMISSION")
            .with_data(json!({ "permission": token }))
    }

    pub(crate) fn unknown_member_role(role: &str) -> Self {
        let role = role.to_owned();
        error!(%role, "unrecognized member role in storage");
        let message = format!("Member role {role} is not recognized.");

        Self::from_descriptor(&INTERNAL_SERVER_ERROR_DESCRIPTOR, Some(message))
            .with_name("UNKNOWN_MEMBER_ROLE")
            .with_data(json!({ "role": role }))
    }

    pub(crate) fn into_payload(self) -> (StatusCode, UserFriendlyPayload) {
        let AppError {
            descriptor,
            name,
            error_type,
            message,
            data,
            source: _,
        } = self;

        let status = descriptor.status;
        let (code, reason) = code_and_reason(status);
        let payload = UserFriendlyPayload {
            status: status.as_u16(),
            code,
            reason,
            error_type,
            name,
            message,
            data,
        };

        (status, payload)
    }

    fn from_descriptor(descriptor: &'static ErrorDescriptor, message: Option<String>) -> Self {
        Self {
            descriptor,
            name: descriptor.name.to_owned(),
            error_type: descriptor.error_type.to_owned(),
            message: message.unwrap_or_else(|| descriptor.default_message.to_owned()),
            data: None,
            source: None,
        }
    }

    fn with_source(mut self, error: AnyError) -> Self {
        self.source = Some(error);
        self
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    pub(crate) fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = self.into_payload();
        (status, Json(payload)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserFriendlyPayload {
    pub(crate) status: u16,
    pub(crate) code: String,
    pub(crate) reason: String,
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) name: String,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<JsonValue>,
}

fn code_and_reason(status: StatusCode) -> (String, String) {
    let reason = status
        .canonical_reason()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Status {}", status.as_u16()));

    let code = reason
        .chars()
        .map(|ch| match ch {
            'a'..='z' => ch.to_ascii_uppercase(),
            'A'..='Z' | '0'..='9' => ch,
            ' ' | '-' | '/' | '\\' => '_',
            _ => '_',
        })
        .collect::<String>();

    (code, reason)
}
