//! Shared doubles for integration tests: a programmable HTTP backend and
//! in-process node, relay, token list and repository implementations.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::consensus::{SignableTransaction, TxLegacy};
use alloy::primitives::{uint, Address, Bytes, TxKind, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use multisig_wallet::crypto::{CreationTransaction, EthSignature};
use multisig_wallet::domain::{Transaction, TransactionHash, TransactionId};
use multisig_wallet::error::NetworkError;
use multisig_wallet::node::{EthereumNode, Receipt, ReceiptStatus};
use multisig_wallet::relay::{
    EstimateTransactionRequest, EstimateTransactionResponse, GasPriceResponse,
    SafeCreationRequest, SafeCreationResponse, SubmitTransactionRequest, TransactionRelay,
};
use multisig_wallet::repository::{InMemoryTransactionRepository, TransactionRepository};
use multisig_wallet::tokens::{TokenList, TokenListItem};

/// Anvil development keys #0..#2
pub const OWNER_KEYS: [&str; 3] = [
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

/// One parsed request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Start a programmable HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            201 => "201 Created",
                            202 => "202 Accepted",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let body_start = header_end + 4;
        if buf.len() < body_start + content_length {
            continue;
        }

        let mut request_line = head.lines().next()?.split_whitespace();
        return Some(MockRequest {
            method: request_line.next()?.to_string(),
            path: request_line.next()?.to_string(),
            body: String::from_utf8_lossy(&buf[body_start..body_start + content_length]).to_string(),
        });
    }
}

/// reqwest client that ignores proxy environment variables.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn hash(byte: u8) -> TransactionHash {
    TransactionHash(B256::repeat_byte(byte))
}

/// Programmable chain state.
#[derive(Default)]
pub struct MockNode {
    pub balances: DashMap<Address, U256>,
    /// Balance of addresses not in `balances`.
    pub default_balance: Mutex<U256>,
    pub receipts: DashMap<TransactionHash, ReceiptStatus>,
    pub safe_nonce: Mutex<U256>,
    pub receipt_queries: AtomicUsize,
    /// When set, receipt lookups fail as if the node were unreachable.
    pub unavailable: AtomicBool,
    pub receipt_query_times: Mutex<Vec<tokio::time::Instant>>,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mine(&self, hash: TransactionHash, status: ReceiptStatus) {
        self.receipts.insert(hash, status);
    }
}

#[async_trait]
impl EthereumNode for MockNode {
    async fn get_balance(&self, address: Address) -> Result<U256, NetworkError> {
        let fallback = *self.default_balance.lock().unwrap();
        Ok(self.balances.get(&address).map(|b| *b).unwrap_or(fallback))
    }

    async fn get_transaction_receipt(
        &self,
        hash: TransactionHash,
    ) -> Result<Option<Receipt>, NetworkError> {
        self.receipt_queries.fetch_add(1, Ordering::SeqCst);
        self.receipt_query_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(NetworkError::Unavailable("connection refused".into()));
        }
        Ok(self.receipts.get(&hash).map(|status| Receipt {
            transaction_hash: hash,
            block_number: Some(1),
            status: *status,
        }))
    }

    /// Every call answers the safe nonce.
    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, NetworkError> {
        let nonce = *self.safe_nonce.lock().unwrap();
        Ok(Bytes::from(nonce.to_be_bytes::<32>().to_vec()))
    }
}

/// x coordinate of the secp256k1 generator; a valid `r` for either parity.
const CREATION_R: U256 =
    uint!(0x79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798_U256);

/// Build a relay creation response the way an honest relay does: the
/// deployer is whatever key recovers from `(r, s)` over the creation tx.
pub fn honest_creation(request: &SafeCreationRequest) -> SafeCreationResponse {
    let s: U256 = request.s.parse().unwrap();
    let signature = EthSignature { r: CREATION_R, s, v: 27 };
    let mut tx = CreationTransaction {
        from: Address::ZERO,
        value: U256::ZERO,
        data: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
        gas: 500_000,
        gas_price: 1_000_000_000,
        nonce: 0,
    };
    let unsigned = TxLegacy {
        chain_id: None,
        nonce: tx.nonce,
        gas_price: tx.gas_price,
        gas_limit: tx.gas,
        to: TxKind::Create,
        value: tx.value,
        input: tx.data.clone(),
    };
    tx.from = signature
        .to_signature()
        .unwrap()
        .recover_address_from_prehash(&unsigned.signature_hash())
        .unwrap();

    SafeCreationResponse {
        signature,
        safe: tx.from.create(tx.nonce),
        tx,
        payment: U256::from(1_000_000u64),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayBehaviour {
    Honest,
    /// Claims a safe address it does not control.
    WrongSafe,
    /// Ignores the client's random `s`.
    WrongS,
}

/// In-process relay recording what it was asked to do.
pub struct MockRelay {
    pub behaviour: RelayBehaviour,
    pub creation_hash: TransactionHash,
    pub submit_hash: TransactionHash,
    pub dropped: Mutex<Vec<TransactionHash>>,
    pub started: Mutex<Vec<Address>>,
    pub submitted: Mutex<Vec<SubmitTransactionRequest>>,
    /// Runs once, after the relay accepted a submission.
    pub on_submit: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MockRelay {
    pub fn new(behaviour: RelayBehaviour) -> Self {
        Self {
            behaviour,
            creation_hash: hash(0xc1),
            submit_hash: hash(0x5b),
            dropped: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            on_submit: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TransactionRelay for MockRelay {
    async fn create_safe_creation_transaction(
        &self,
        request: &SafeCreationRequest,
    ) -> Result<SafeCreationResponse, NetworkError> {
        let mut response = honest_creation(request);
        match self.behaviour {
            RelayBehaviour::Honest => {}
            RelayBehaviour::WrongSafe => response.safe = Address::repeat_byte(0x66),
            RelayBehaviour::WrongS => response.signature.s += U256::from(1),
        }
        Ok(response)
    }

    async fn start_safe_creation(&self, safe: Address) -> Result<(), NetworkError> {
        self.started.lock().unwrap().push(safe);
        Ok(())
    }

    async fn safe_creation_transaction_hash(
        &self,
        safe: Address,
    ) -> Result<Option<TransactionHash>, NetworkError> {
        let started = self.started.lock().unwrap().contains(&safe);
        Ok(started.then_some(self.creation_hash))
    }

    async fn gas_price(&self) -> Result<GasPriceResponse, NetworkError> {
        Ok(GasPriceResponse {
            fast: U256::from(4),
            fastest: U256::from(6),
            standard: U256::from(2),
            safe_low: U256::from(1),
        })
    }

    async fn submit_transaction(
        &self,
        request: &SubmitTransactionRequest,
    ) -> Result<TransactionHash, NetworkError> {
        self.submitted.lock().unwrap().push(request.clone());
        if let Some(hook) = self.on_submit.lock().unwrap().take() {
            hook();
        }
        Ok(self.submit_hash)
    }

    async fn estimate_transaction(
        &self,
        _request: &EstimateTransactionRequest,
    ) -> Result<EstimateTransactionResponse, NetworkError> {
        Ok(EstimateTransactionResponse {
            safe_tx_gas: U256::from(50_000),
            data_gas: U256::from(10_000),
            gas_price: U256::from(2),
            gas_token: Address::ZERO,
        })
    }

    async fn is_transaction_dropped(&self, hash: TransactionHash) -> Result<bool, NetworkError> {
        Ok(self.dropped.lock().unwrap().contains(&hash))
    }
}

/// Repository that counts writes per transaction.
#[derive(Default)]
pub struct CountingRepository {
    inner: InMemoryTransactionRepository,
    saves: Mutex<HashMap<TransactionId, usize>>,
}

impl CountingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saves(&self, id: TransactionId) -> usize {
        self.saves.lock().unwrap().get(&id).copied().unwrap_or(0)
    }
}

impl TransactionRepository for CountingRepository {
    fn save(&self, transaction: &Transaction) {
        *self.saves.lock().unwrap().entry(transaction.id()).or_default() += 1;
        self.inner.save(transaction);
    }

    fn find_by_id(&self, id: TransactionId) -> Option<Transaction> {
        self.inner.find_by_id(id)
    }

    fn remove(&self, transaction: &Transaction) {
        self.inner.remove(transaction);
    }

    fn next_id(&self) -> TransactionId {
        self.inner.next_id()
    }
}

/// Token list with fixed content.
pub struct StaticTokenList(pub Vec<TokenListItem>);

#[async_trait]
impl TokenList for StaticTokenList {
    async fn items(&self) -> Result<Vec<TokenListItem>, NetworkError> {
        Ok(self.0.clone())
    }
}
