//! Per-method hash-key derivation and forwarding shim.
//!
//! Each proxied method reads the hash-key source named for its family,
//! attaches it to the outbound call as a [`HashKey`] extension, and
//! forwards over the connection the picker resolves. Methods without a
//! natural affinity field use a process-wide pseudo-random key so load
//! is spread rather than concentrated.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hashring::HashKey;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

use xchain_proto::xchain_client::XchainClient;
use xchain_proto::xchain_server::Xchain;
use xchain_proto::*;

use crate::balance::Balancer;

/// Backoff between `post_tx` pick attempts while waiting for a
/// connection to become ready. The retry loop itself is unbounded: the
/// gateway imposes no timeout of its own, mirroring the upstream gRPC
/// `WaitForReady` semantic. Tonic drops this future when the inbound
/// call's deadline expires or the caller cancels, which is what actually
/// bounds the wait.
const POST_TX_RETRY_BACKOFF: Duration = Duration::from_millis(50);

static RNG: Lazy<Mutex<StdRng>> = Lazy::new(|| Mutex::new(StdRng::from_entropy()));

fn pseudo_random_hash_key() -> String {
    let n: u32 = RNG.lock().unwrap().gen_range(0..10_000);
    format!("abcdefg{n}")
}

fn require_address(address: &str) -> Result<String, Status> {
    if address.is_empty() {
        Err(Status::invalid_argument("address is required"))
    } else {
        Ok(address.to_string())
    }
}

fn tx_from_addr(payload: &TxStatus) -> Result<String, Status> {
    let tx = payload
        .tx
        .as_ref()
        .ok_or_else(|| Status::invalid_argument("tx is required"))?;
    let input = tx
        .tx_inputs
        .first()
        .ok_or_else(|| Status::invalid_argument("tx has no inputs"))?;
    String::from_utf8(input.from_addr.clone())
        .map_err(|_| Status::invalid_argument("from_addr is not valid utf-8"))
}

/// Implements the proxied service by deriving a hash key per method and
/// dispatching over whatever connection the current picker resolves it
/// to.
pub struct GatewayService {
    balancer: Arc<Balancer>,
}

impl GatewayService {
    pub fn new(balancer: Arc<Balancer>) -> Self {
        Self { balancer }
    }

    fn pick(&self, hash_key: &str) -> Result<Channel, Status> {
        self.balancer
            .picker()
            .pick(Some(hash_key))
            .map_err(|_| Status::unavailable("no backend connection available"))
    }

    /// Picks a connection for `hash_key`, attaches it to the outbound
    /// request, and dispatches via `call`. Fails fast on
    /// `NoConnAvailable`.
    async fn forward<Req, Resp, F, Fut>(
        &self,
        hash_key: String,
        payload: Req,
        call: F,
    ) -> Result<Response<Resp>, Status>
    where
        F: FnOnce(XchainClient<Channel>, Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        let channel = self.pick(&hash_key)?;
        let client = XchainClient::new(channel);
        let mut request = Request::new(payload);
        request.extensions_mut().insert(HashKey(hash_key));
        call(client, request).await
    }
}

#[tonic::async_trait]
impl Xchain for GatewayService {
    async fn post_tx(
        &self,
        request: Request<TxStatus>,
    ) -> Result<Response<CommonReply>, Status> {
        let payload = request.into_inner();
        let hash_key = tx_from_addr(&payload)?;
        tracing::info!(hash_key, "post_tx");

        let channel = loop {
            match self.pick(&hash_key) {
                Ok(channel) => break channel,
                Err(_) => tokio::time::sleep(POST_TX_RETRY_BACKOFF).await,
            }
        };

        let mut client = XchainClient::new(channel);
        let mut request = Request::new(payload);
        request.extensions_mut().insert(HashKey(hash_key));
        client.post_tx(request).await
    }

    async fn query_acl(
        &self,
        request: Request<AclStatus>,
    ) -> Result<Response<AclStatus>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move { c.query_acl(r).await })
            .await
    }

    async fn query_tx(&self, request: Request<TxStatus>) -> Result<Response<TxStatus>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move { c.query_tx(r).await })
            .await
    }

    async fn get_balance(
        &self,
        request: Request<AddressStatus>,
    ) -> Result<Response<AddressStatus>, Status> {
        let payload = request.into_inner();
        let hash_key = require_address(&payload.address)?;
        self.forward(hash_key, payload, |mut c, r| async move { c.get_balance(r).await })
            .await
    }

    async fn get_frozen_balance(
        &self,
        request: Request<AddressStatus>,
    ) -> Result<Response<AddressStatus>, Status> {
        let payload = request.into_inner();
        let hash_key = require_address(&payload.address)?;
        self.forward(hash_key, payload, |mut c, r| async move {
            c.get_frozen_balance(r).await
        })
        .await
    }

    async fn get_block(&self, request: Request<BlockId>) -> Result<Response<Block>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move { c.get_block(r).await })
            .await
    }

    async fn get_block_chain_status(
        &self,
        request: Request<BcStatus>,
    ) -> Result<Response<BcStatus>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move {
            c.get_block_chain_status(r).await
        })
        .await
    }

    async fn get_block_chains(
        &self,
        request: Request<CommonIn>,
    ) -> Result<Response<BlockChains>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move {
            c.get_block_chains(r).await
        })
        .await
    }

    async fn get_system_status(
        &self,
        request: Request<CommonIn>,
    ) -> Result<Response<SystemsStatusReply>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move {
            c.get_system_status(r).await
        })
        .await
    }

    async fn select_utxo(
        &self,
        request: Request<UtxoInput>,
    ) -> Result<Response<UtxoOutput>, Status> {
        let payload = request.into_inner();
        let hash_key = require_address(&payload.address)?;
        self.forward(hash_key, payload, |mut c, r| async move { c.select_utxo(r).await })
            .await
    }

    async fn deploy_native_code(
        &self,
        request: Request<DeployNativeCodeRequest>,
    ) -> Result<Response<DeployNativeCodeResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = require_address(&payload.address)?;
        self.forward(hash_key, payload, |mut c, r| async move {
            c.deploy_native_code(r).await
        })
        .await
    }

    async fn native_code_status(
        &self,
        request: Request<NativeCodeStatusRequest>,
    ) -> Result<Response<NativeCodeStatusResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move {
            c.native_code_status(r).await
        })
        .await
    }

    async fn dpos_candidates(
        &self,
        request: Request<DposCandidatesRequest>,
    ) -> Result<Response<DposCandidatesResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move {
            c.dpos_candidates(r).await
        })
        .await
    }

    async fn dpos_nominate_records(
        &self,
        request: Request<DposNominateRecordsRequest>,
    ) -> Result<Response<DposNominateRecordsResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = require_address(&payload.address)?;
        self.forward(hash_key, payload, |mut c, r| async move {
            c.dpos_nominate_records(r).await
        })
        .await
    }

    async fn dpos_nominee_records(
        &self,
        request: Request<DposNomineeRecordsRequest>,
    ) -> Result<Response<DposNomineeRecordsResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = require_address(&payload.address)?;
        self.forward(hash_key, payload, |mut c, r| async move {
            c.dpos_nominee_records(r).await
        })
        .await
    }

    async fn dpos_vote_records(
        &self,
        request: Request<DposVoteRecordsRequest>,
    ) -> Result<Response<DposVoteRecordsResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = require_address(&payload.address)?;
        self.forward(hash_key, payload, |mut c, r| async move {
            c.dpos_vote_records(r).await
        })
        .await
    }

    async fn dpos_voted_records(
        &self,
        request: Request<DposVotedRecordsRequest>,
    ) -> Result<Response<DposVotedRecordsResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = require_address(&payload.address)?;
        self.forward(hash_key, payload, |mut c, r| async move {
            c.dpos_voted_records(r).await
        })
        .await
    }

    async fn dpos_check_results(
        &self,
        request: Request<DposCheckResultsRequest>,
    ) -> Result<Response<DposCheckResultsResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move {
            c.dpos_check_results(r).await
        })
        .await
    }

    async fn pre_exec(
        &self,
        request: Request<InvokeRpcRequest>,
    ) -> Result<Response<InvokeRpcResponse>, Status> {
        let payload = request.into_inner();
        let hash_key = pseudo_random_hash_key();
        self.forward(hash_key, payload, |mut c, r| async move { c.pre_exec(r).await })
            .await
    }
}
