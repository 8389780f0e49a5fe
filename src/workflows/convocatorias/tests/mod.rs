mod common;
mod rendicion;
