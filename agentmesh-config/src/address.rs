//! Resolves the address an agent advertises to the registry, which is not
//! necessarily the address its HTTP server binds to (a process typically
//! binds `0.0.0.0` but must advertise a routable host).

use std::net::UdpSocket;

use crate::AgentConfig;

/// Builds the HTTP endpoint this agent should report to the registry,
/// given the port its server actually bound to (relevant when
/// [`AgentConfig::http_port`] is `0` and the OS chose one).
///
/// Resolution order: an explicit full-endpoint override wins outright;
/// otherwise a host is chosen from, in order, an explicit advertise host,
/// `POD_IP`, `HOST`, auto-detection via a local outbound route, and
/// finally `localhost`.
#[must_use]
pub fn resolve_advertised_endpoint(config: &AgentConfig, bound_port: u16) -> String {
    if let Some(endpoint) = &config.http_endpoint_override {
        return endpoint.clone();
    }

    let host = config
        .http_advertise_host
        .clone()
        .or_else(|| config.pod_ip.clone())
        .or_else(|| config.host_env.clone())
        .or_else(detect_local_ip)
        .unwrap_or_else(|| "localhost".to_owned());

    format!("http://{host}:{bound_port}")
}

/// Finds this host's outbound IP by asking the OS which local address it
/// would use to route to an arbitrary public address. Opens no connection
/// and sends no packets — UDP `connect` only consults the routing table.
fn detect_local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins() {
        let mut config = AgentConfig::default();
        config.http_endpoint_override = Some("https://agent.internal:9443".to_owned());
        assert_eq!(
            resolve_advertised_endpoint(&config, 8080),
            "https://agent.internal:9443"
        );
    }

    #[test]
    fn advertise_host_beats_pod_ip() {
        let mut config = AgentConfig::default();
        config.http_advertise_host = Some("agent.svc.cluster.local".to_owned());
        config.pod_ip = Some("10.0.0.5".to_owned());
        assert_eq!(
            resolve_advertised_endpoint(&config, 8080),
            "http://agent.svc.cluster.local:8080"
        );
    }

    #[test]
    fn pod_ip_beats_host_env() {
        let mut config = AgentConfig::default();
        config.pod_ip = Some("10.0.0.5".to_owned());
        config.host_env = Some("somehost".to_owned());
        assert_eq!(resolve_advertised_endpoint(&config, 8080), "http://10.0.0.5:8080");
    }

    #[test]
    fn falls_back_to_localhost_when_nothing_resolves() {
        let mut config = AgentConfig::default();
        config.http_advertise_host = None;
        config.pod_ip = None;
        config.host_env = None;
        let endpoint = resolve_advertised_endpoint(&config, 8080);
        assert!(endpoint.starts_with("http://"));
        assert!(endpoint.ends_with(":8080"));
    }
}
