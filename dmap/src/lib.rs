pub use cluster::{DMapNode, NodeConfig};
pub use dmap::DMap;
pub use error::{CodecError, DMapError, ForwardError};
pub use hkey::{derive, HashKey};

pub mod cli;
pub mod cluster;
pub mod codec;
mod dmap;
pub mod error;
pub mod forward;
pub mod hkey;
pub mod lease;
pub mod metadata;
pub mod partition;
pub mod pool;
pub mod proto;
#[cfg(feature = "rpc-server")]
pub mod rpc_server;
pub mod util;

use std::error::Error;
use std::sync::Arc;

use cli::{DMapCli, DMapCommands, ServerArgs};
use codec::{Codec, CodecRegistry};
use forward::ZrpcForwarder;
use metadata::PartitionTable;
use pool::ClientPool;
use tracing::info;

/// A node serving its key-value RPC over zenoh.
pub struct DMapServer {
    pub node: Arc<DMapNode>,
    pub oracle: Arc<PartitionTable>,
    #[cfg(feature = "rpc-server")]
    pub kv_service: rpc_server::KvService,
}

impl DMapServer {
    pub fn close(&mut self) {
        self.node.close();
        #[cfg(feature = "rpc-server")]
        self.kv_service.close();
    }
}

pub async fn start_server(
    options: ServerArgs,
    registry: CodecRegistry,
) -> Result<DMapServer, Box<dyn Error + Send + Sync>> {
    info!("use option {options:?}");
    let config = options.to_config();
    info!("start member {}", config.this);

    let z_session = zenoh::open(zenoh::Config::default()).await?;
    let oracle = Arc::new(PartitionTable::new(
        options.partition_count,
        options.all_members(),
    ));
    let pool = ClientPool::new(z_session.clone(), options.prefix.clone());
    let node = Arc::new(DMapNode::new(
        config,
        oracle.clone(),
        Arc::new(ZrpcForwarder::new(pool)),
        Codec::new(Arc::new(registry)),
    ));
    node.clone().start_reclaimer(options.reclaim_interval);

    #[cfg(feature = "rpc-server")]
    let kv_service =
        rpc_server::serve(node.clone(), z_session.clone(), &options.prefix).await?;

    Ok(DMapServer {
        node,
        oracle,
        #[cfg(feature = "rpc-server")]
        kv_service,
    })
}

pub async fn handle_cli(cli: DMapCli) -> Result<(), Box<dyn Error + Send + Sync>> {
    match cli.command {
        DMapCommands::Server(options) => {
            let registry = CodecRegistry::builder().with_builtin().build()?;
            let mut server = start_server(options, registry).await?;
            tokio::signal::ctrl_c().await?;
            info!("received ctrl-c, shutting down");
            server.close();
        }
    }
    Ok(())
}
