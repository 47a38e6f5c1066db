use std::env;
use std::fmt::Debug;
use std::str::FromStr;

/// How many videos the popularity ranking holds unless configured otherwise.
pub const DEFAULT_POPULAR_COUNT: i64 = 10;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Parses the named environment variable, falling back to `default`
/// when it is not defined. Panics if it is defined but does not parse.
pub fn get_parsed_variable<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Debug,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|e| panic!("parse {} ({:?}): {:?}", name, value, e)),
        Err(_) => default,
    }
}
