pub mod identity;
pub mod memory;
pub mod query;
pub mod remote;

pub use identity::{GoTrueClient, IdentityProvider, MemoryIdentity};
pub use memory::MemoryStore;
pub use query::{Cardinality, Direction, Embed, TableQuery};
pub use remote::{rpc_as, select_as, RemoteData, RestClient};
