/// Well-known TCP ports and their service names, in scan order.
pub const COMMON_PORTS: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (111, "RPCBind"),
    (135, "MSRPC"),
    (139, "NetBIOS"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (465, "SMTPS"),
    (587, "SMTP Submission"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (1521, "Oracle"),
    (2049, "NFS"),
    (3000, "Dev Server"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5000, "UPnP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8000, "HTTP-Alt"),
    (8080, "HTTP-Proxy"),
    (8443, "HTTPS-Alt"),
    (9200, "Elasticsearch"),
    (27017, "MongoDB"),
];

/// Ports where a TLS handshake is attempted to read the certificate subject.
pub const TLS_PORTS: &[u16] = &[443, 8443];

/// Ports in the well-known table, in table order.
pub fn common_ports() -> Vec<u16> {
    COMMON_PORTS.iter().map(|(p, _)| *p).collect()
}

/// Service name for an exact port match, `"Unknown"` otherwise.
pub fn service_name(port: u16) -> &'static str {
    COMMON_PORTS
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

/// Parse an inclusive `start-end` range.
///
/// Malformed input, port 0 and reversed ranges all yield an empty list.
pub fn parse_port_range(s: &str) -> Vec<u16> {
    let Some((a, b)) = s.trim().split_once('-') else {
        return Vec::new();
    };
    match (parse_port_str(a), parse_port_str(b)) {
        (Some(start), Some(end)) if start <= end => (start..=end).collect(),
        _ => Vec::new(),
    }
}

/// Parse a comma-separated port list such as `"80, 443,8080"`.
///
/// Non-numeric or out-of-range tokens are skipped. Duplicates are kept in
/// the order given.
pub fn parse_port_list(s: &str) -> Vec<u16> {
    s.split(',').filter_map(parse_port_str).collect()
}

fn parse_port_str(s: &str) -> Option<u16> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(p) => Some(p),
    }
}
