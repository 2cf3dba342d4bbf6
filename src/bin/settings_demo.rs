use turnstile::settings::*;

fn main() {
    // Load settings from the default location
    let project_settings = parse_settings(None).unwrap();
    println!("Loaded settings: {:?}", project_settings);

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // Secrets may come from the environment instead of the file
    // $ TURNSTILE__AUTH__ACCESS_SECRET=a TURNSTILE__AUTH__REFRESH_SECRET=b \
    //   cargo run --bin settings_demo -- --settings=settings/release.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref()).unwrap();
    println!("Loaded settings: {:?}", project_settings);
    println!(
        "access ttl {:?}, refresh ttl {:?}, revoke on reuse {}",
        project_settings.auth.access_ttl(),
        project_settings.auth.refresh_ttl(),
        project_settings.auth.revoke_on_reuse
    );
}
