pub mod bridge_event;
