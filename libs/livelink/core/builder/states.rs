/// Type-state markers for the builder pattern
///
/// These types track at compile time whether the endpoint and the
/// transport factory have been supplied, so `build()` only exists once
/// both are set.

use std::marker::PhantomData;

/// Marker trait for endpoint state
pub trait EndpointState {}

/// Endpoint has not been set
pub struct NoEndpoint;
impl EndpointState for NoEndpoint {}

/// Endpoint has been set
pub struct HasEndpoint;
impl EndpointState for HasEndpoint {}

/// Marker trait for transport state
pub trait TransportState {}

/// Transport factory has not been set
pub struct NoTransport;
impl TransportState for NoTransport {}

/// Transport factory has been set
pub struct HasTransport;
impl TransportState for HasTransport {}

/// Phantom marker carried by the builder
#[derive(Debug, Clone, Copy)]
pub struct TypeState<E, T> {
    _endpoint: PhantomData<E>,
    _transport: PhantomData<T>,
}

impl<E, T> TypeState<E, T> {
    pub(crate) fn new() -> Self {
        Self {
            _endpoint: PhantomData,
            _transport: PhantomData,
        }
    }
}

impl<E, T> Default for TypeState<E, T> {
    fn default() -> Self {
        Self::new()
    }
}
