mod dutch;
mod english;
mod registration;
mod restart;
