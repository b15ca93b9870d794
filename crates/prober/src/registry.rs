use crate::{
    CosmosDialect, Dialect, EvmDialect, NearDialect, PoktDialect, SolanaDialect, StarknetDialect,
};

/// Protocol families a chain identifier can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Evm,
    /// EVM node whose `eth_syncing` may report a highest block of zero when synced
    EvmLenientSync,
    Pokt,
    Solana,
    Cosmos,
    Near,
    Starknet,
}

static EVM: EvmDialect = EvmDialect::new();
static EVM_LENIENT: EvmDialect = EvmDialect::lenient();
static POKT: PoktDialect = PoktDialect;
static SOLANA: SolanaDialect = SolanaDialect;
static COSMOS: CosmosDialect = CosmosDialect;
static NEAR: NearDialect = NearDialect;
static STARKNET: StarknetDialect = StarknetDialect;

impl Protocol {
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Protocol::Evm => &EVM,
            Protocol::EvmLenientSync => &EVM_LENIENT,
            Protocol::Pokt => &POKT,
            Protocol::Solana => &SOLANA,
            Protocol::Cosmos => &COSMOS,
            Protocol::Near => &NEAR,
            Protocol::Starknet => &STARKNET,
        }
    }
}

/// How to reach a chain's RPC on an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub protocol: Protocol,
    /// Fixed sub-path the RPC is served under, for subnet-style chains
    pub path: Option<&'static str>,
}

impl Route {
    const fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            path: None,
        }
    }

    const fn subnet(path: &'static str) -> Self {
        Self {
            protocol: Protocol::Evm,
            path: Some(path),
        }
    }

    /// Resolve the chain identifier; unknown chains are treated as EVM
    pub fn for_chain(chain_id: &str) -> Self {
        ROUTES
            .iter()
            .find(|(ids, _)| ids.iter().any(|id| id.eq_ignore_ascii_case(chain_id)))
            .map(|(_, route)| *route)
            .unwrap_or(Route::new(Protocol::Evm))
    }

    /// Validate `base` and apply the route's sub-path
    pub fn target(&self, base: &str) -> eyre::Result<String> {
        let url = url::Url::parse(base)?;
        if !matches!(url.scheme(), "http" | "https") {
            eyre::bail!("Unsupported URL scheme: {}", url.scheme());
        }
        if url.host_str().is_none() {
            eyre::bail!("Target has no host: {}", base);
        }
        Ok(match self.path {
            Some(path) => format!("{}{}", base.trim_end_matches('/'), path),
            None => base.to_string(),
        })
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.protocol.dialect()
    }
}

const ROUTES: &[(&[&str], Route)] = &[
    (&["0001"], Route::new(Protocol::Pokt)),
    (&["0006", "0067", "0068"], Route::new(Protocol::Solana)),
    (&["0054"], Route::new(Protocol::Cosmos)),
    (&["0052"], Route::new(Protocol::Near)),
    (&["0060", "0061"], Route::new(Protocol::Starknet)),
    (&["0074"], Route::new(Protocol::EvmLenientSync)),
    // Avalanche C-chain and subnets
    (&["0003"], Route::subnet("/ext/bc/C/rpc")),
    (
        &["03DF"],
        Route::subnet("/ext/bc/q2aTwKuyzgs8pynF7UXBZCU7DejbZbZ6EUyHr3JQzYgwNPUPi/rpc"),
    ),
    (
        &["03CB"],
        Route::subnet("/ext/bc/2K33xS9AyP9oCDiHYKVrHe7F54h2La5D8erpTChaAhdzeSu2RX/rpc"),
    ),
];
