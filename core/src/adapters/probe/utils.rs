pub struct Utils;

impl Utils {
    /// Split a socket-table `address:port` column.
    ///
    /// Handles the forms `ss` and `lsof` print:
    /// - IPv4: "127.0.0.1:3000", "*:8080", "127.0.0.53%lo:53"
    /// - IPv6: "\[::1]:3000", "\[fe80::1%eth0]:8080"
    ///
    /// Interface scopes (`%lo`) are dropped and an empty or `0.0.0.0`
    /// address is reported as the wildcard `*`.
    pub fn parse_address(address: &str) -> Option<(String, u16)> {
        let (addr, port_str) = if address.starts_with('[') {
            let bracket_end = address.find(']')?;
            let port_str = address[bracket_end + 1..].strip_prefix(':')?;
            (&address[1..bracket_end], port_str)
        } else {
            let last_colon = address.rfind(':')?;
            (&address[..last_colon], &address[last_colon + 1..])
        };

        let port: u16 = port_str.parse().ok()?;
        let addr = addr.split('%').next().unwrap_or(addr);
        let addr = match addr {
            "" | "0.0.0.0" | "::" => "*",
            other => other,
        };
        Some((addr.to_string(), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4_address() {
        let (addr, port) = Utils::parse_address("127.0.0.1:3000").unwrap();
        assert_eq!(addr, "127.0.0.1");
        assert_eq!(port, 3000);

        let (addr, port) = Utils::parse_address("0.0.0.0:8080").unwrap();
        assert_eq!(addr, "*");
        assert_eq!(port, 8080);

        let (addr, port) = Utils::parse_address("127.0.0.53%lo:53").unwrap();
        assert_eq!(addr, "127.0.0.53");
        assert_eq!(port, 53);
    }

    #[test]
    fn test_parse_ipv6_address() {
        let (addr, port) = Utils::parse_address("[::1]:3000").unwrap();
        assert_eq!(addr, "::1");
        assert_eq!(port, 3000);

        let (addr, port) = Utils::parse_address("[::]:22").unwrap();
        assert_eq!(addr, "*");
        assert_eq!(port, 22);

        let (addr, _) = Utils::parse_address("[fe80::1%eth0]:8080").unwrap();
        assert_eq!(addr, "fe80::1");
    }

    #[test]
    fn test_parse_rejects_wildcard_port() {
        assert!(Utils::parse_address("0.0.0.0:*").is_none());
        assert!(Utils::parse_address("[::1]8080").is_none());
    }
}
