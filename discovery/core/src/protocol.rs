/// Application protocols spoken by a service port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Http,
    Http2,
    Https,
    Grpc,
    Tls,
}

impl Protocol {
    /// Infers a port's protocol from its transport protocol and the
    /// `<protocol>[-<suffix>]` port-naming convention.
    ///
    /// Unrecognized names fall back to TCP.
    pub fn infer(port_name: Option<&str>, transport: Option<&str>) -> Self {
        if let Some(transport) = transport {
            if transport.eq_ignore_ascii_case("udp") {
                return Self::Udp;
            }
        }

        let prefix = port_name
            .unwrap_or("")
            .split('-')
            .next()
            .unwrap_or_default();
        if prefix.eq_ignore_ascii_case("http") {
            Self::Http
        } else if prefix.eq_ignore_ascii_case("http2") {
            Self::Http2
        } else if prefix.eq_ignore_ascii_case("https") {
            Self::Https
        } else if prefix.eq_ignore_ascii_case("grpc") {
            Self::Grpc
        } else if prefix.eq_ignore_ascii_case("tls") {
            Self::Tls
        } else {
            Self::Tcp
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => "TCP".fmt(f),
            Protocol::Udp => "UDP".fmt(f),
            Protocol::Http => "HTTP".fmt(f),
            Protocol::Http2 => "HTTP2".fmt(f),
            Protocol::Https => "HTTPS".fmt(f),
            Protocol::Grpc => "GRPC".fmt(f),
            Protocol::Tls => "TLS".fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Protocol;

    #[test]
    fn infers_from_port_name() {
        assert_eq!(Protocol::infer(Some("http-web"), Some("TCP")), Protocol::Http);
        assert_eq!(Protocol::infer(Some("grpc"), Some("TCP")), Protocol::Grpc);
        assert_eq!(Protocol::infer(Some("HTTPS"), None), Protocol::Https);
        assert_eq!(Protocol::infer(Some("metrics"), Some("TCP")), Protocol::Tcp);
        assert_eq!(Protocol::infer(None, Some("TCP")), Protocol::Tcp);
    }

    #[test]
    fn transport_udp_wins() {
        assert_eq!(Protocol::infer(Some("http-web"), Some("UDP")), Protocol::Udp);
    }
}
