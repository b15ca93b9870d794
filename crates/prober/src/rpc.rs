use crate::Prober;
use prober_api::{ProbeRecord, ProberApiServer};

/// Implementation of the Prober RPC server
pub struct ProberRpcServer {
    prober: Prober,
}

impl ProberRpcServer {
    pub fn new(prober: Prober) -> Self {
        Self { prober }
    }
}

#[jsonrpsee::core::async_trait]
impl ProberApiServer for ProberRpcServer {
    async fn probe(
        &self,
        target: String,
        chain_id: String,
    ) -> Result<ProbeRecord, jsonrpsee::types::ErrorObjectOwned> {
        Ok(self.prober.probe(&target, &chain_id).await)
    }
}

/// Start the RPC server
pub async fn start_rpc_server(
    addr: std::net::SocketAddr,
    prober: Prober,
) -> eyre::Result<(jsonrpsee::server::ServerHandle, std::net::SocketAddr)> {
    use jsonrpsee::server::Server;

    let server = Server::builder().build(addr).await?;
    let local_addr = server.local_addr()?;

    let rpc_server = ProberRpcServer::new(prober);
    let handle = server.start(rpc_server.into_rpc());

    tracing::info!("Prober RPC server listening on {}", local_addr);

    Ok((handle, local_addr))
}
