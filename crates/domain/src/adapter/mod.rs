mod adapter_connection;
mod adapter_kind;

#[cfg(any(test, feature = "mock"))]
pub use adapter_connection::MockAdapter;
pub use adapter_connection::Adapter;
pub use adapter_kind::AdapterKind;
