use std::time::Duration;

use crate::cluster::NodeConfig;
use crate::metadata::{Member, DEFAULT_PARTITION_COUNT};
use crate::util::parse_duration;

#[derive(clap::Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct DMapCli {
    #[command(subcommand)]
    pub command: DMapCommands,
}

#[derive(clap::Subcommand, Clone, Debug)]
pub enum DMapCommands {
    /// Start as server
    Server(ServerArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServerArgs {
    /// advertised host
    #[arg(long, env = "DMAP_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// advertised port, part of the member identity
    #[arg(short, long, env = "DMAP_PORT", default_value = "3320")]
    pub port: u16,
    /// Other members as host:port. This node is always a member.
    #[arg(long = "member", env = "DMAP_MEMBERS", value_delimiter = ',')]
    pub members: Vec<Member>,
    #[arg(long, env = "DMAP_PARTITION_COUNT", default_value_t = DEFAULT_PARTITION_COUNT)]
    pub partition_count: u64,
    /// Forwarding depth after which a request fails
    #[arg(long, default_value_t = 3)]
    pub max_hops: u8,
    /// Deadline of a forwarded request, e.g. "5s"
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub request_timeout: Duration,
    /// Interval of the expired entry sweep
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub reclaim_interval: Duration,
    /// Zenoh key prefix shared by the cluster
    #[arg(long, env = "DMAP_PREFIX", default_value = "dmap")]
    pub prefix: String,
}

impl Default for ServerArgs {
    fn default() -> Self {
        ServerArgs {
            host: "127.0.0.1".into(),
            port: 3320,
            members: vec![],
            partition_count: DEFAULT_PARTITION_COUNT,
            max_hops: 3,
            request_timeout: Duration::from_secs(5),
            reclaim_interval: Duration::from_secs(1),
            prefix: "dmap".into(),
        }
    }
}

impl ServerArgs {
    pub fn this(&self) -> Member {
        Member::new(self.host.clone(), self.port)
    }

    /// All members including this node, sorted and without duplicates.
    pub fn all_members(&self) -> Vec<Member> {
        let mut members = self.members.clone();
        members.push(self.this());
        members.sort();
        members.dedup();
        members
    }

    pub fn to_config(&self) -> NodeConfig {
        NodeConfig {
            this: self.this(),
            partition_count: self.partition_count,
            max_hops: self.max_hops,
            request_timeout: self.request_timeout,
        }
    }
}
