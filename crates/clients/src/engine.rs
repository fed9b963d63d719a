use std::{borrow::Cow, time::Duration};

use alloy::{
    providers::{Provider, RootProvider},
    rpc::client::RpcClient,
    transports::{
        RpcError, TransportErrorKind, TransportResult,
        http::{Http, reqwest::Url},
    },
};
use alloy_primitives::{B256, Bytes};
use alloy_rpc_types_engine::JwtSecret;
use alloy_transport_http::{
    AuthLayer, HyperClient,
    hyper_util::{client::legacy::Client, rt::TokioExecutor},
};
use argo_primitives::retries::is_connection_refused;
use derive_more::derive::Deref;
use http_body_util::Full;
use serde::Deserialize;
use tokio_retry::{RetryIf, strategy::ExponentialBackoff};
use tower::ServiceBuilder;

const ROLLUP_AUTH_NAMESPACE: &str = "rollupAuth_";
const SYNC_TO_L1_HEAD: &str = "syncToL1Head";

/// The L2 chain state reported by the engine after a sync request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSyncStatus {
    /// The number of the highest L2 block derived so far.
    pub l2_head_number: u64,
    /// The hash of the highest L2 block derived so far.
    pub l2_head_hash: B256,
}

/// The [`EngineClient`] is responsible for interacting with the L2 engine API
/// via HTTP. The inner transport uses a JWT [`AuthLayer`] to authenticate
/// requests.
#[derive(Debug, Clone, Deref)]
pub struct EngineClient {
    inner: RootProvider,
}

impl EngineClient {
    /// Creates a new [`EngineClient`] from the provided [Url] and [`JwtSecret`].
    pub fn new(url: Url, jwt: JwtSecret) -> Self {
        let hyper_client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();

        let auth_layer = AuthLayer::new(jwt);
        let service = ServiceBuilder::new().layer(auth_layer).service(hyper_client);

        let layer_transport = HyperClient::<Full<Bytes>, _>::with_service(service);
        let http_hyper = Http::with_client(layer_transport, url);
        let rpc_client = RpcClient::new(http_hyper, true);
        let inner = RootProvider::new(rpc_client);

        Self { inner }
    }

    /// Instruct the engine to derive its chain up to the given L1 head.
    ///
    /// The engine tracks the canonical L1 view it was last handed and applies
    /// all rollup blocks proposed up to that point; this call moves that
    /// cursor forward and returns the resulting L2 chain state.
    pub async fn sync_to_l1_head(
        &self,
        l1_number: u64,
        l1_hash: B256,
    ) -> TransportResult<EngineSyncStatus> {
        let retry_strategy =
            ExponentialBackoff::from_millis(10).max_delay(Duration::from_millis(1_000));

        let client = self.inner.client();
        let method = Cow::from(format!("{ROLLUP_AUTH_NAMESPACE}{SYNC_TO_L1_HEAD}"));

        // The retry layer does not compose with the auth layer, so transient
        // transport errors are retried manually here.
        RetryIf::spawn(
            retry_strategy,
            || async {
                client
                    .request::<(u64, B256), EngineSyncStatus>(method.clone(), (l1_number, l1_hash))
                    .await
            },
            |res: &RpcError<TransportErrorKind>| {
                if let RpcError::Transport(e) = res {
                    e.is_retry_err() || is_connection_refused(e)
                } else {
                    false
                }
            },
        )
        .await
    }
}
