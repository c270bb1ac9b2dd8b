pub mod resolve_testkit;
