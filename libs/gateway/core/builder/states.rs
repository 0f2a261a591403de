//! Builder stages
//!
//! Each required slot of [`ConnectBuilder`](super::ConnectBuilder) is a type
//! parameter whose stage holds the supplied value, so a complete builder
//! carries its endpoint and credentials directly.

use crate::traits::Credentials;

/// Stage of the endpoint slot
pub trait EndpointStage: sealed::Sealed {}

/// Stage of the credentials slot
pub trait CredentialsStage: sealed::Sealed {}

/// No endpoint yet
#[derive(Debug, Default)]
pub struct NoEndpoint;
impl EndpointStage for NoEndpoint {}

/// Gateway endpoint as given to `url()`
#[derive(Debug)]
pub struct Endpoint(pub(crate) String);
impl EndpointStage for Endpoint {}

/// No credentials yet
#[derive(Debug, Default)]
pub struct NoCredentials;
impl CredentialsStage for NoCredentials {}

#[derive(Debug)]
pub struct WithCredentials(pub(crate) Credentials);
impl CredentialsStage for WithCredentials {}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::NoEndpoint {}
    impl Sealed for super::Endpoint {}
    impl Sealed for super::NoCredentials {}
    impl Sealed for super::WithCredentials {}
}
