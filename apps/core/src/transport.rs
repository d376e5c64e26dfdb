use serde::{Deserialize, Serialize};

use crate::contract::{CoreRequest, CoreResponse};
use crate::core_service::{CoreService, ServiceError};
use crate::vault::VaultError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    InvalidRequest,
    CliNotFound,
    FileNotFound,
    LockedDatabase,
    Cli,
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportResponse {
    Ok { response: CoreResponse },
    Err { error: ErrorResponse },
}

/// The single place where session errors become user-visible notices. No
/// retries happen here or anywhere below; a transient failure surfaces once
/// and the user re-invokes.
pub fn handle_request(service: &mut CoreService, request: CoreRequest) -> TransportResponse {
    match service.handle_command(request) {
        Ok(response) => TransportResponse::Ok { response },
        Err(error) => TransportResponse::Err {
            error: map_service_error(error),
        },
    }
}

pub fn handle_json(service: &mut CoreService, payload: &str) -> String {
    let response = match serde_json::from_str::<CoreRequest>(payload) {
        Ok(request) => handle_request(service, request),
        Err(error) => TransportResponse::Err {
            error: ErrorResponse {
                code: ErrorCode::InvalidJson,
                message: error.to_string(),
            },
        },
    };

    serde_json::to_string(&response)
        .unwrap_or_else(|_| serde_json::to_string(&encoding_failure_response()).unwrap_or_default())
}

/// Last-resort response when a real response fails to encode. Built from the
/// same DTOs as every other response so it can never itself be invalid JSON.
fn encoding_failure_response() -> TransportResponse {
    TransportResponse::Err {
        error: ErrorResponse {
            code: ErrorCode::InvalidRequest,
            message: "response encoding failed".to_string(),
        },
    }
}

fn map_service_error(error: ServiceError) -> ErrorResponse {
    match error {
        ServiceError::InvalidRequest(message) => ErrorResponse {
            code: ErrorCode::InvalidRequest,
            message,
        },
        ServiceError::Config(error) => ErrorResponse {
            code: ErrorCode::Config,
            message: error.to_string(),
        },
        ServiceError::Vault(error) => {
            let code = match &error {
                VaultError::CliNotFound => ErrorCode::CliNotFound,
                VaultError::FileNotFound(_) => ErrorCode::FileNotFound,
                VaultError::Locked => ErrorCode::LockedDatabase,
                VaultError::Cli(_) => ErrorCode::Cli,
            };
            ErrorResponse {
                code,
                message: error.to_string(),
            }
        }
    }
}
