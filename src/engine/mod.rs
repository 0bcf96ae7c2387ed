// SousChef: chat transports.
//   channels - transport-neutral glue (routing, message splitting)
//   telegram - Bot API long-polling bridge

pub mod channels;
pub mod telegram;
