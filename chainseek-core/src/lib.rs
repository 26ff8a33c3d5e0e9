pub mod report;
pub mod search;
pub mod store;

use colored::Colorize;

const BANNER: &str = r#"
   ___ _         _                  _
  / __| |_  __ _(_)_ _  ___ ___ ___| |__
 | (__| ' \/ _` | | ' \(_-</ -_) -_) / /
  \___|_||_\__,_|_|_||_/__/\___\___|_\_\
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "keyword search over suggestion chains".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
