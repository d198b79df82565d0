// Consumers of simulation frames

pub mod imgstream;
