use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Env};

pub fn init_logger() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {} ({}:{})",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0)
            )
        })
        .init();
}
