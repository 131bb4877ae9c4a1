pub(crate) mod common;

mod sla;
