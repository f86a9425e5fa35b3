//! Feeds node settings from `.env` into the firmware as compile-time values.

const SETTINGS: [(&str, &str); 5] = [
    ("NOWSCAN_WIFI_SSID", ""),
    ("NOWSCAN_WIFI_PASSWORD", ""),
    ("NOWSCAN_PEER", ""),
    ("NOWSCAN_ROLE", "client"),
    ("NOWSCAN_STRATEGY", "vote"),
];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    // A missing .env is fine; the defaults apply.
    let _ = dotenvy::dotenv();

    for (key, default) in SETTINGS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
        println!("cargo:rustc-env={key}={value}");
    }
}
