mod db_trait;
pub use db_trait::{LookupError, LookupFlags, LookupResult, PrincipalDb};

mod record;
pub use record::{Attributes, PrincipalRecord};

mod memory;
pub use memory::MemoryDb;

mod keytab;
pub use keytab::{keytab_to_db, load_file_keytab, load_keytab_db};
