//! Fetches a PHP script from a local PHP-FPM pool and prints the response.
//!
//! Usage: `phpinfo <script path> [host:port]`, defaulting to PHP-FPM's
//! standard TCP address. The script path must be visible to the pool, for
//! example `/srv/www/phpinfo.php` containing `<?php phpinfo();`.

use std::io::{self, Write};
use std::process::ExitCode;

use fcgi_client::{Client, Config, Error, Request};


fn run(script: &str, host: &str, port: u16) -> Result<(), Error> {
    let config = Config::tcp(host, port)
        .timeout(std::time::Duration::from_secs(5));
    let mut client = Client::new(config);

    let request = Request::new()
        .param("SCRIPT_FILENAME", script)
        .param("SCRIPT_NAME", script)
        .param("REQUEST_METHOD", "GET")
        .param("SERVER_PROTOCOL", "HTTP/1.1")
        .param("GATEWAY_INTERFACE", "CGI/1.1");

    let pending = client.send(&request)?;
    let response = pending.wait(&mut client)?;

    eprintln!("status: {}", response.status);
    for (name, values) in &response.headers {
        for value in values {
            eprintln!("{name}: {value}");
        }
    }
    // The body may be arbitrary bytes, so skip the String detour
    io::stdout().write_all(&response.body).map_err(Error::Write)?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(script) = args.next() else {
        eprintln!("usage: phpinfo <script path> [host:port]");
        return ExitCode::FAILURE;
    };
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:9000".to_owned());
    let Some((host, port)) = addr.rsplit_once(':') else {
        eprintln!("invalid address {addr}, expected host:port");
        return ExitCode::FAILURE;
    };
    let Ok(port) = port.parse() else {
        eprintln!("invalid port in {addr}");
        return ExitCode::FAILURE;
    };

    match run(&script, host, port) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("request failed: {err}");
            ExitCode::FAILURE
        }
    }
}
