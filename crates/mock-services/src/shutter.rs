//! Encryption network routes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{debug, info};

use auction_crypto::decrypt_hex;
use auction_types::shutter::{
    DecryptCommitmentQuery, DecryptedCommitment, DecryptionKeyQuery, DecryptionKeyRelease,
    EncryptionDataQuery, EncryptionMaterial, RegisterIdentityRequest, RegisteredIdentity,
    ShutterResponse,
};
use auction_types::{encode_hex, is_wallet_address, IdentityPrefix};

use crate::error::ApiError;
use crate::{digest, identity_for, Registration, SharedState};

type ShutterResult<T> = Result<Json<ShutterResponse<T>>, ApiError>;

fn parse_prefix(value: &str) -> Result<IdentityPrefix, ApiError> {
    value
        .parse()
        .map_err(|e| ApiError::bad_request(format!("Invalid identity prefix: {e}")))
}

pub async fn register_identity(
    State(state): State<SharedState>,
    Json(request): Json<RegisterIdentityRequest>,
) -> ShutterResult<RegisteredIdentity> {
    let mut state = state.write();
    state.calls.register_identity += 1;

    if let Some(status) = state.register_failure {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Err(ApiError::new(status, "Identity registration failed"));
    }

    let prefix = parse_prefix(&request.identity_prefix)?;
    if request.decryption_timestamp as i64 <= state.now() {
        return Err(ApiError::bad_request(
            "Decryption timestamp must be in the future",
        ));
    }
    if state.registration_for_prefix(&prefix).is_some() {
        return Err(ApiError::bad_request("Identity already registered"));
    }

    let registration = Registration {
        identity_prefix: prefix,
        identity: identity_for(&prefix),
        decryption_timestamp: request.decryption_timestamp,
        tx_hash: digest(b"MOCK_SHUTTER_TX", &prefix.0),
    };
    info!(
        identity_prefix = %prefix,
        decryption_timestamp = request.decryption_timestamp,
        "Registered identity"
    );

    let response = RegisteredIdentity {
        identity: registration.identity.clone(),
        eon_key: state.eon_key().to_hex(),
        eon: state.eon,
        tx_hash: Some(registration.tx_hash.clone()),
        identity_prefix: prefix.to_hex(),
    };
    state
        .registrations
        .insert(registration.identity.clone(), registration);

    Ok(Json(ShutterResponse::new(response)))
}

pub async fn get_data_for_encryption(
    State(state): State<SharedState>,
    Query(query): Query<EncryptionDataQuery>,
) -> ShutterResult<EncryptionMaterial> {
    let mut state = state.write();
    state.calls.get_data_for_encryption += 1;

    if !is_wallet_address(&query.address) {
        return Err(ApiError::bad_request("Invalid address"));
    }
    let prefix = parse_prefix(&query.identity_prefix)?;
    let registration = state
        .registration_for_prefix(&prefix)
        .ok_or_else(|| ApiError::not_found("Identity not registered"))?;

    debug!(identity_prefix = %prefix, "Serving encryption material");
    Ok(Json(ShutterResponse::new(EncryptionMaterial {
        identity: registration.identity.clone(),
        eon_key: state.eon_key().to_hex(),
        eon: state.eon,
        epoch_id: digest(b"MOCK_SHUTTER_EPOCH", registration.identity.as_bytes()),
        identity_prefix: prefix.to_hex(),
    })))
}

pub async fn get_decryption_key(
    State(state): State<SharedState>,
    Query(query): Query<DecryptionKeyQuery>,
) -> ShutterResult<DecryptionKeyRelease> {
    let mut state = state.write();
    state.calls.get_decryption_key += 1;

    let key = state
        .released_key(&query.identity)?
        .ok_or_else(|| ApiError::not_found("Decryption key not yet released"))?;
    let registration = state.registration(&query.identity)?;

    Ok(Json(ShutterResponse::new(DecryptionKeyRelease {
        decryption_key: key.to_hex(),
        identity: registration.identity.clone(),
        decryption_timestamp: registration.decryption_timestamp,
    })))
}

pub async fn decrypt_commitment(
    State(state): State<SharedState>,
    Query(query): Query<DecryptCommitmentQuery>,
) -> ShutterResult<DecryptedCommitment> {
    let mut state = state.write();
    state.calls.decrypt_commitment += 1;

    let key = state
        .released_key(&query.identity)?
        .ok_or_else(|| ApiError::bad_request("Decryption key not yet released"))?;
    let message = decrypt_hex(&query.encrypted_commitment, &key.to_hex())
        .map_err(|e| ApiError::bad_request(format!("Failed to decrypt commitment: {e}")))?;

    Ok(Json(ShutterResponse::new(DecryptedCommitment {
        decrypted_message: encode_hex(message),
    })))
}
