//! Typed clients for the STACKIT APIs the CLI talks to

pub mod alb;
pub mod authorization;
pub mod client;
pub mod dns;
pub mod iaas;
pub mod object_storage;
pub mod resource_manager;
pub mod ske;
pub mod wait;

pub use client::{ApiClient, ApiRequest, ApiResponse, HttpTransport, Method, UreqTransport};
pub use wait::{PollState, Waiter};

/// Remote services with a configurable base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Alb,
    Authorization,
    Dns,
    Iaas,
    ObjectStorage,
    ResourceManager,
    Ske,
}

impl Service {
    /// Prefix of the `<prefix>-custom-endpoint` config key
    pub fn config_prefix(self) -> &'static str {
        match self {
            Service::Alb => "alb",
            Service::Authorization => "authorization",
            Service::Dns => "dns",
            Service::Iaas => "iaas",
            Service::ObjectStorage => "object-storage",
            Service::ResourceManager => "resource-manager",
            Service::Ske => "ske",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Service::Alb => "https://alb.api.stackit.cloud",
            Service::Authorization => "https://authorization.api.stackit.cloud",
            Service::Dns => "https://dns.api.stackit.cloud",
            Service::Iaas => "https://iaas.api.stackit.cloud",
            Service::ObjectStorage => "https://object-storage.api.stackit.cloud",
            Service::ResourceManager => "https://resource-manager.api.stackit.cloud",
            Service::Ske => "https://ske.api.stackit.cloud",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CUSTOM_ENDPOINTS;

    #[test]
    fn test_every_service_has_an_endpoint_key() {
        for svc in [
            Service::Alb,
            Service::Authorization,
            Service::Dns,
            Service::Iaas,
            Service::ObjectStorage,
            Service::ResourceManager,
            Service::Ske,
        ] {
            assert!(CUSTOM_ENDPOINTS
                .iter()
                .any(|(prefix, _)| *prefix == svc.config_prefix()));
        }
    }
}
