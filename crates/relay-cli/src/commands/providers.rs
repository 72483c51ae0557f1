use relay_core::Session;

pub fn run(session: &Session) {
    let registry = session.registry();
    let names = registry.names();

    println!("Registered providers ({}):", names.len());
    for name in names {
        match registry.config(&name) {
            Some(config) => println!(
                "{name:<12} {:<10} schema={:<3} stream={:<3} {}",
                config.wire_format.to_string(),
                yes_no(config.supports_schema),
                yes_no(config.supports_streaming),
                config.endpoint
            ),
            None => println!("{name:<12} (custom constructor)"),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
