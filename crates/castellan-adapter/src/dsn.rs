//! Native driver DSNs rewritten as `sqlx` connection URLs.
//!
//! Operators carry over two non-URL forms from existing deployments:
//! - MySQL: `user:pass@tcp(host:3306)/db?parseTime=true`
//! - Postgres: libpq `host=db user=app dbname=authz sslmode=disable`
//!
//! Query parameters the target driver does not know are passed through; `sqlx`
//! ignores them.
use crate::{AdapterError, AdapterResult};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

const MYSQL_DEFAULT_ADDR: &str = "127.0.0.1:3306";

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn mysql_error(reason: &'static str) -> AdapterError {
    AdapterError::InvalidDsn {
        driver: "mysql",
        reason,
    }
}

fn postgres_error(reason: &'static str) -> AdapterError {
    AdapterError::InvalidDsn {
        driver: "postgres",
        reason,
    }
}

/// Rewrite `[user[:password]@][net[(addr)]]/dbname[?params]` as a `mysql://` URL.
///
/// The database name follows the last `/`, and the credentials end at the last
/// `@` before it, so passwords may contain `@` or `:`.
pub(crate) fn mysql_url(dsn: &str) -> AdapterResult<String> {
    let slash = dsn
        .rfind('/')
        .ok_or_else(|| mysql_error("expected a mysql:// url or user@tcp(host)/db"))?;
    let (head, tail) = (&dsn[..slash], &dsn[slash + 1..]);
    let (database, query) = tail.split_once('?').unwrap_or((tail, ""));

    let (credentials, address) = head.rsplit_once('@').unwrap_or(("", head));
    let (user, password) = match credentials.split_once(':') {
        Some((user, password)) => (user, Some(password)),
        None => (credentials, None),
    };

    let (net, addr) = match address.split_once('(') {
        Some((net, rest)) => {
            let addr = rest
                .strip_suffix(')')
                .ok_or_else(|| mysql_error("unclosed address parenthesis"))?;
            (net, addr)
        }
        None => (address, ""),
    };

    let mut params = Vec::new();
    if !query.is_empty() {
        params.push(query.to_string());
    }
    let host = match net {
        "" | "tcp" if addr.is_empty() => MYSQL_DEFAULT_ADDR.to_string(),
        "" | "tcp" => addr.to_string(),
        "unix" => {
            if addr.is_empty() {
                return Err(mysql_error("unix network requires a socket path"));
            }
            params.push(format!("socket={}", encode(addr)));
            "localhost".to_string()
        }
        _ => return Err(mysql_error("unsupported network; expected tcp or unix")),
    };

    let mut url = String::from("mysql://");
    if !user.is_empty() {
        url.push_str(&encode(user));
        if let Some(password) = password {
            url.push(':');
            url.push_str(&encode(password));
        }
        url.push('@');
    }
    url.push_str(&host);
    url.push('/');
    url.push_str(&encode(database));
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }
    Ok(url)
}

/// Rewrite a libpq keyword/value string as a `postgres://` URL.
///
/// `host`, `hostaddr`, `port`, `user`, `password`, and `dbname` become URL
/// parts; every other keyword becomes a query parameter. A host starting with
/// `/` is a socket directory and is percent-encoded so `sqlx` recognizes it.
pub(crate) fn postgres_url(dsn: &str) -> AdapterResult<String> {
    let pairs = libpq_pairs(dsn)?;
    if pairs.is_empty() {
        return Err(postgres_error("expected a postgres:// url or key=value pairs"));
    }

    let mut host = None;
    let mut hostaddr = None;
    let mut port = None;
    let mut user = None;
    let mut password = None;
    let mut dbname = None;
    let mut params = Vec::new();
    for (key, value) in pairs {
        match key.as_str() {
            "host" => host = Some(value),
            "hostaddr" => hostaddr = Some(value),
            "port" => port = Some(value),
            "user" => user = Some(value),
            "password" => password = Some(value),
            "dbname" => dbname = Some(value),
            _ => params.push(format!("{}={}", encode(&key), encode(&value))),
        }
    }

    let mut url = String::from("postgres://");
    if let Some(user) = user.filter(|u| !u.is_empty()) {
        url.push_str(&encode(&user));
        if let Some(password) = password {
            url.push(':');
            url.push_str(&encode(&password));
        }
        url.push('@');
    }
    match host.or(hostaddr).filter(|h| !h.is_empty()) {
        Some(host) if host.starts_with('/') => url.push_str(&encode(&host)),
        Some(host) => url.push_str(&host),
        None => url.push_str("localhost"),
    }
    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(postgres_error("port must be numeric"));
        }
        url.push(':');
        url.push_str(&port);
    }
    if let Some(dbname) = dbname {
        url.push('/');
        url.push_str(&encode(&dbname));
    }
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }
    Ok(url)
}

/// Split `key = value` pairs; values may be single-quoted with `\'` and `\\`
/// escapes.
fn libpq_pairs(dsn: &str) -> AdapterResult<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = dsn.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(pairs);
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') || key.is_empty() {
            return Err(postgres_error("expected key=value pairs"));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\'') => break,
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => return Err(postgres_error("unterminated quoted value")),
                    },
                    Some(c) => value.push(c),
                    None => return Err(postgres_error("unterminated quoted value")),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }
        pairs.push((key, value));
    }
}
