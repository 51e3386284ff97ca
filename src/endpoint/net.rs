use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use anyhow::ensure;
use http::uri::Scheme;

use crate::errors::UiError;
use crate::strset::StringSet;

pub fn join_host_port(host: &str, port: &str) -> String {
    // We assume that host is a literal IPv6 address
    // if host has colons.
    if host.find(':').is_some() {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

pub fn split_host_port(host_port: &str) -> anyhow::Result<(String, String)> {
    // A bare ":port" addresses every interface.
    if let Some(port) = host_port.strip_prefix(':') {
        if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
            return Ok((String::new(), port.to_owned()));
        }
    }
    let url = host_port.parse::<http::Uri>()?;
    ensure!(
        url.scheme().is_none()
            || url.scheme() == Some(&Scheme::HTTP)
            || url.scheme() == Some(&Scheme::HTTPS),
        UiError::InvalidAddressFlag.msg(format!("invalid scheme '{}'", url.scheme().unwrap()))
    );
    let authority = url
        .authority()
        .ok_or_else(|| UiError::InvalidAddressFlag.msg("empty host:port".to_owned()))?;
    ensure!(
        authority.as_str().splitn(2, '@').count() == 1,
        UiError::InvalidAddressFlag
            .msg(format!("invalid host:port '{}'", url.authority().unwrap()))
    ); // no username/password
    ensure!(
        url.path().is_empty()
            || (url.scheme().is_some() && url.path() == "/") && url.query().is_none(),
        UiError::InvalidAddressFlag
            .msg(format!("redundant path/query '{:?}'", url.path_and_query()))
    ); // no path/query/fragment
    let host = url.host().unwrap_or("").to_owned();
    let port = url.port().map_or_else(
        || {
            if url.scheme() == Some(&Scheme::HTTP) {
                "80".to_owned()
            } else if url.scheme() == Some(&Scheme::HTTPS) {
                "443".to_owned()
            } else {
                "".to_owned()
            }
        },
        |p| p.to_string(),
    );
    Ok((host, port))
}

pub fn get_local_ip4() -> StringSet {
    let interfaces = pnet::datalink::interfaces();
    let mut ip_list = StringSet::new();
    for inf in interfaces {
        for ip in inf.ips {
            if let IpAddr::V4(ip) = ip.ip() {
                ip_list.add(ip.to_string());
            }
        }
    }
    ip_list
}

pub fn get_local_ip6() -> StringSet {
    let interfaces = pnet::datalink::interfaces();
    let mut ip_list = StringSet::new();
    for inf in interfaces {
        for ip in inf.ips {
            if let IpAddr::V6(ip) = ip.ip() {
                ip_list.add(ip.to_string());
            }
        }
    }
    ip_list
}

pub async fn get_host_ip(host: &str) -> anyhow::Result<StringSet> {
    // Literal IPs short-circuit, only names hit the resolver.
    if let Ok(ip) = host.parse::<IpAddr>() {
        let mut ip_list = StringSet::new();
        ip_list.add(ip.to_string());
        return Ok(ip_list);
    }
    let mut ip_list = StringSet::new();
    for addr in tokio::net::lookup_host((host, 0u16)).await? {
        ip_list.add(addr.ip().to_string());
    }
    Ok(ip_list)
}

pub fn is_host_ip(ip_addr: &str) -> bool {
    let host = split_host_port(ip_addr)
        .map(|(host, _)| host)
        .unwrap_or_else(|_| ip_addr.to_owned());
    host.parse::<IpAddr>().is_ok()
}

pub async fn is_local_host(host: &str, port: &str, local_port: &str) -> anyhow::Result<bool> {
    let mut host_ips = get_host_ip(host).await?;
    let mut local_v4_ips = get_local_ip4().intersection(&host_ips);
    if local_v4_ips.is_empty() {
        host_ips = host_ips.apply_fn(|ip| {
            let ip: IpAddr = ip.parse().unwrap();
            if ip.is_loopback() {
                // For any loopback IP which is not 127.0.0.1,
                // convert it to check for intersections.
                return "127.0.0.1".to_owned();
            }
            ip.to_string()
        });
        local_v4_ips = get_local_ip4().intersection(&host_ips);
    }
    let local_v6_ips = get_local_ip6().intersection(&host_ips);

    Ok((!local_v4_ips.is_empty() || !local_v6_ips.is_empty())
        && (port.is_empty() || port == local_port))
}

pub async fn check_local_server_addr(server_addr: &str) -> anyhow::Result<()> {
    let (host, _) = split_host_port(server_addr)?;
    if !host.is_empty()
        && host != Ipv4Addr::UNSPECIFIED.to_string()
        && host != Ipv6Addr::UNSPECIFIED.to_string()
    {
        let local = is_local_host(&host, "", "").await?;
        ensure!(
            local,
            UiError::InvalidAddressFlag
                .msg("host in server address should be this server".to_owned())
        );
    }
    Ok(())
}
