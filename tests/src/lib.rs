//! End-to-end tests against OPC UA stand-ins on the loopback interface.

#[cfg(test)]
mod support;

#[cfg(test)]
mod probe;

#[cfg(test)]
mod scanner;

#[cfg(test)]
mod discovery;
