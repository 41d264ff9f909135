mod gossip;
