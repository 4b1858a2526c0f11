use std::env;
use std::net::{IpAddr, Ipv4Addr};

pub struct Config {
    pub server: ServerConfig,
    pub exec: ExecConfig,
    pub ai: AiConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origin allowed through CORS on the HTTP surface.
    pub frontend_origin: String,
}

#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub api_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .expect("Invalid SERVER_PORT"),
                frontend_origin: env::var("FRONTEND_ORIGIN")
                    .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            },
            exec: ExecConfig {
                api_url: env::var("EXEC_API_URL")
                    .unwrap_or_else(|_| "https://emkc.org".to_string()),
                timeout_secs: env::var("EXEC_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
            ai: AiConfig {
                api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
                api_url: env::var("GEMINI_API_URL")
                    .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
                model: env::var("GEMINI_MODEL")
                    .unwrap_or_else(|_| "gemini-flash-latest".to_string()),
            },
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        // Handle common hostnames
        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(host: &str, port: u16) -> Config {
        Config {
            server: ServerConfig {
                host: host.to_string(),
                port,
                frontend_origin: "http://localhost:5173".to_string(),
            },
            exec: ExecConfig {
                api_url: "https://emkc.org".to_string(),
                timeout_secs: 30,
            },
            ai: AiConfig {
                api_key: None,
                api_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-flash-latest".to_string(),
            },
        }
    }

    #[test]
    fn test_parse_localhost() {
        let config = test_config("localhost", 5000);
        assert_eq!(config.bind_address(), ([127, 0, 0, 1], 5000));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = test_config("192.168.1.1", 3000);
        assert_eq!(config.bind_address(), ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_all_interfaces() {
        let config = test_config("0.0.0.0", 5000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 5000));
    }

    #[test]
    fn test_parse_empty_host() {
        let config = test_config("", 5000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 5000));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = test_config("invalid-hostname", 9000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 9000));
    }
}
