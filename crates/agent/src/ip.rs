// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local IP discovery for registration.
//!
//! Resolution order, first non-empty wins:
//! 1. `NODE_IP` (explicit operator intent, e.g. via the downward API)
//! 2. `HOST_IP`
//! 3. `POD_IP` — with a node-IP lookup through the K8s API unless
//!    `HOST_NETWORK=true` (on host network the pod IP IS the node IP)
//! 4. K8s API node InternalIP
//! 5. first non-loopback IPv4 on an UP interface
//! 6. `/proc/net/fib_trie` LOCAL scan (reliable in minimal containers)
//! 7. UDP probe local address
//! 8. `127.0.0.1`

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::{Api, Client};
use std::net::Ipv4Addr;

/// Discover the address to report in the registration payload.
pub async fn discover_ip() -> String {
    if let Ok(node_ip) = std::env::var("NODE_IP") {
        let trimmed = node_ip.trim();
        if !trimmed.is_empty() {
            if let Some(ip) = first_ipv4_from_str(trimmed) {
                return ip;
            }
            // Unparsable but explicitly configured: report it rather than
            // second-guessing the operator.
            return trimmed.to_string();
        }
    }

    if let Ok(host_ip) = std::env::var("HOST_IP") {
        if let Some(ip) = first_ipv4_from_str(&host_ip) {
            if ip != "127.0.0.1" {
                return ip;
            }
        }
    }

    if let Ok(pod_ip) = std::env::var("POD_IP") {
        if let Some(ip) = first_ipv4_from_str(&pod_ip) {
            if ip != "127.0.0.1" {
                if std::env::var("HOST_NETWORK").as_deref() != Ok("true") {
                    if let Some(node_ip) = node_ip_from_k8s().await {
                        return node_ip;
                    }
                }
                return ip;
            }
        }
    }

    if let Some(ip) = node_ip_from_k8s().await {
        return ip;
    }

    if let Some(ip) = first_interface_ipv4() {
        return ip;
    }

    if let Ok(data) = std::fs::read_to_string("/proc/net/fib_trie") {
        if let Some(ip) = local_ipv4_from_fib_trie(&data) {
            return ip;
        }
    }

    if let Some(ip) = udp_probe_local_ip() {
        return ip;
    }

    "127.0.0.1".to_string()
}

/// First IPv4 in a separator-delimited list ("10.0.0.1,127.0.0.1").
pub fn first_ipv4_from_str(s: &str) -> Option<String> {
    s.split([' ', '\t', ',', ';'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .find_map(|p| p.parse::<Ipv4Addr>().ok().map(|ip| ip.to_string()))
}

/// Node InternalIP via the K8s API. `NODE_NAME` names the node directly;
/// otherwise the pod (named by `HOSTNAME`) is looked up for its node.
async fn node_ip_from_k8s() -> Option<String> {
    let client = Client::try_default().await.ok()?;

    let node_name = match std::env::var("NODE_NAME").ok().filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => {
            let pod_name = std::env::var("HOSTNAME")
                .ok()
                .filter(|h| !h.is_empty())
                .or_else(|| hostname::get().ok().map(|h| h.to_string_lossy().into_owned()))?;
            let namespace =
                std::env::var("POD_NAMESPACE").unwrap_or_else(|_| "default".to_string());

            let pods: Api<Pod> = Api::namespaced(client.clone(), &namespace);
            let pod = pods.get(&pod_name).await.ok()?;
            pod.spec?.node_name?
        }
    };

    let nodes: Api<Node> = Api::all(client);
    let node = nodes.get(&node_name).await.ok()?;
    let addresses = node.status?.addresses?;

    addresses
        .iter()
        .find(|a| a.type_ == "InternalIP")
        .or_else(|| addresses.first())
        .map(|a| a.address.clone())
}

/// First non-loopback IPv4 on an UP interface.
fn first_interface_ipv4() -> Option<String> {
    let interfaces = if_addrs::get_if_addrs().ok()?;
    interfaces.iter().find_map(|iface| {
        if iface.is_loopback() {
            return None;
        }
        match iface.ip() {
            std::net::IpAddr::V4(ip) if !ip.is_loopback() => Some(ip.to_string()),
            _ => None,
        }
    })
}

/// Scan fib_trie text for a `/32 host LOCAL` entry.
///
/// The file interleaves address lines (`|-- 10.2.0.13`) with attribute
/// lines; a LOCAL host attribute refers to the closest preceding address.
pub fn local_ipv4_from_fib_trie(data: &str) -> Option<String> {
    let mut candidate: Option<Ipv4Addr> = None;
    for line in data.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("|-- ") {
            let addr = rest.split_whitespace().next().unwrap_or("");
            candidate = addr.parse::<Ipv4Addr>().ok();
            continue;
        }
        if line.contains("/32 host LOCAL") {
            if let Some(ip) = candidate.take() {
                if !ip.is_loopback() && !ip.is_unspecified() {
                    return Some(ip.to_string());
                }
            }
        }
    }
    None
}

/// Local address of a UDP socket "connected" to a public resolver. No
/// packets are sent; the kernel just picks the egress interface.
fn udp_probe_local_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()? {
        std::net::SocketAddr::V4(addr) if !addr.ip().is_loopback() => Some(addr.ip().to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "ip_tests.rs"]
mod tests;
