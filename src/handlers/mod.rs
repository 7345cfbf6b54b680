pub mod waitlist;
