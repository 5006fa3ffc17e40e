//! Discovery and JWKS endpoint handlers.

use axum::extract::State;
use axum::Json;

use crate::discovery::ProviderMetadata;
use crate::jwks::JsonWebKeySet;

use super::dispatch::JsonError;
use super::state::OidcState;

/// GET `/.well-known/openid-configuration`
pub(crate) async fn well_known(State(state): State<OidcState>) -> Json<ProviderMetadata> {
    Json(state.provider.metadata.clone())
}

/// GET `/login/jwks`
pub(crate) async fn jwks(State(state): State<OidcState>) -> Result<Json<JsonWebKeySet>, JsonError> {
    state.provider.jwks().map(Json).map_err(JsonError)
}
