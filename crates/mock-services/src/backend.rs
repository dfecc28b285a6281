//! Auction backend routes.

use alloy::primitives::Signature;
use axum::extract::{Path, State};
use axum::Json;
use tracing::{info, warn};

use auction_crypto::decrypt_hex;
use auction_types::{
    compare_amounts, format_decryption_time, is_wallet_address, Auction, BidPlaintext,
    SealedAuctionResults, SealedBid, SubmissionAck,
};

use crate::error::ApiError;
use crate::types::SubmitBidRequest;
use crate::{MockState, SharedState};

pub async fn auction_by_slug(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<Json<Auction>, ApiError> {
    let state = state.read();
    state
        .auction(&slug)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Auction not found"))
}

pub async fn sealed_auctions(State(state): State<SharedState>) -> Json<Vec<Auction>> {
    let state = state.read();
    Json(
        state
            .auctions
            .values()
            .filter(|a| a.is_sealed())
            .cloned()
            .collect(),
    )
}

/// Recover the signer of an EIP-191 message and compare it to `address`.
fn signed_by(signature: &str, message: &str, address: &str) -> bool {
    signature
        .parse::<Signature>()
        .ok()
        .and_then(|sig| sig.recover_address_from_msg(message).ok())
        .is_some_and(|signer| signer.to_checksum(None).eq_ignore_ascii_case(address))
}

pub async fn submit_bid(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    Json(request): Json<SubmitBidRequest>,
) -> Result<Json<SubmissionAck>, ApiError> {
    let mut state = state.write();
    state.calls.submit_bid += 1;

    let bid = validate_submission(&state, &slug, &request).inspect_err(|e| {
        warn!(auction = %slug, status = e.status.as_u16(), "Rejected bid: {}", e.message);
    })?;

    let id = state.next_bid_id;
    state.next_bid_id += 1;
    let decryption_timestamp = bid.decryption_timestamp;
    let wallet = bid.wallet_address.clone();
    state.bids.entry(slug.clone()).or_default().push(SealedBid { id, ..bid });

    info!(auction = %slug, wallet = %wallet, bid_id = id, "Stored sealed bid");
    Ok(Json(SubmissionAck {
        success: Some(true),
        message: Some("Sealed bid submitted successfully".to_string()),
        bid_id: Some(id.to_string()),
        submitted_at: Some(state.now_datetime().to_rfc3339()),
        decryption_timestamp: Some(format_decryption_time(decryption_timestamp)),
    }))
}

fn validate_submission(
    state: &MockState,
    slug: &str,
    request: &SubmitBidRequest,
) -> Result<SealedBid, ApiError> {
    if !request.has_required_fields() {
        return Err(ApiError::bad_request("Missing required fields"));
    }
    // Presence was checked above.
    let (Some(keys), Some(wallet), Some(signature), Some(message), Some(decryption_timestamp)) = (
        request.encryption_keys.as_ref(),
        request.wallet_address.as_deref(),
        request.signature.as_deref(),
        request.message_to_sign.as_deref(),
        request.decryption_timestamp,
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    if !is_wallet_address(wallet) {
        return Err(ApiError::bad_request("Invalid wallet address format"));
    }

    let auction = state
        .auction(slug)
        .ok_or_else(|| ApiError::not_found("Auction not found"))?;
    if !auction.is_sealed() {
        return Err(ApiError::bad_request("This auction is not a sealed-bid auction"));
    }
    if auction.is_ended(state.now_datetime()) {
        return Err(ApiError::bad_request("auction closed"));
    }
    if decryption_timestamp < auction.decryption_timestamp() {
        return Err(ApiError::bad_request(
            "Decryption timestamp must not be before the auction ends",
        ));
    }

    let registration = state.registration(&keys.identity)?;
    if !registration.identity_prefix.matches_hex(&keys.identity_prefix)
        || registration.decryption_timestamp != decryption_timestamp
    {
        return Err(ApiError::bad_request("Encryption keys do not match the registered identity"));
    }
    if !message.contains(&registration.identity_prefix.to_hex()) {
        return Err(ApiError::bad_request("Signed message does not reference the bid identity"));
    }
    if !signed_by(signature, message, wallet) {
        return Err(ApiError::unauthorized("Invalid signature"));
    }

    Ok(SealedBid {
        id: 0,
        wallet_address: wallet.to_string(),
        encrypted_bid: request.encrypted_bid.clone().unwrap_or_default(),
        decrypted_bid_amount: None,
        decryption_timestamp,
        identity: registration.identity.clone(),
        eon: keys.eon,
        eon_key: keys.eon_key.clone(),
        epoch_id: keys.epoch_id.clone(),
        tx_hash: keys.tx_hash.clone(),
        signature: signature.to_string(),
        message_to_sign: message.to_string(),
        name: request.name.clone(),
    })
}

/// Amount of a bid whose key has been released.
fn reveal(state: &MockState, bid: &SealedBid) -> Option<String> {
    let key = state.released_key(&bid.identity).ok()??;
    let bytes = decrypt_hex(&bid.encrypted_bid, &key.to_hex()).ok()?;
    BidPlaintext::from_json_bytes(&bytes)
        .ok()
        .map(|plaintext| plaintext.bid_amount)
}

pub async fn sealed_auction_results(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<Json<SealedAuctionResults>, ApiError> {
    let state = state.read();
    let auction = state
        .auction(&slug)
        .cloned()
        .ok_or_else(|| ApiError::not_found("Auction not found"))?;

    let attendees: Vec<SealedBid> = state
        .bids
        .get(&slug)
        .map(|bids| {
            bids.iter()
                .map(|bid| SealedBid {
                    decrypted_bid_amount: reveal(&state, bid),
                    ..bid.clone()
                })
                .collect()
        })
        .unwrap_or_default();

    let winner = attendees
        .iter()
        .filter(|bid| bid.decrypted_bid_amount.is_some())
        .max_by(|a, b| {
            compare_amounts(
                a.decrypted_bid_amount.as_deref().unwrap_or("0"),
                b.decrypted_bid_amount.as_deref().unwrap_or("0"),
            )
        })
        .cloned();

    Ok(Json(SealedAuctionResults {
        auction,
        attendees,
        winner,
    }))
}
